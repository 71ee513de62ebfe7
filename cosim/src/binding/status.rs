use cosim_sys::fmi2 as binding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fmi2Res {
    /// All well
    OK,
    /// Things are not quite right, but the computation can continue. The model has called the
    /// logger with the details.
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Fmi2Error {
    /// The slave could not complete the request but the master may decide to continue.
    #[error("Discard")]
    Discard,
    /// The simulation cannot be continued with this instance.
    #[error("Error")]
    Error,
    /// The model computations are irreparably corrupted for all instances.
    #[error("Fatal")]
    Fatal,
    /// Asynchronous stepping is not supported, so a pending result is treated as a failure.
    #[error("Pending")]
    Pending,
    #[error("Unknown status {0}")]
    Unknown(u32),
}

#[derive(Debug)]
pub struct Fmi2Status(pub binding::fmi2Status);

impl Fmi2Status {
    /// Convert to [`Result<Fmi2Res, Fmi2Error>`]
    #[inline]
    pub fn ok(self) -> Result<Fmi2Res, Fmi2Error> {
        self.into()
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.0 == binding::fmi2Status_fmi2Error || self.0 == binding::fmi2Status_fmi2Fatal
    }
}

impl From<binding::fmi2Status> for Fmi2Status {
    fn from(status: binding::fmi2Status) -> Self {
        Self(status)
    }
}

impl From<Fmi2Status> for Result<Fmi2Res, Fmi2Error> {
    fn from(Fmi2Status(status): Fmi2Status) -> Self {
        match status {
            binding::fmi2Status_fmi2OK => Ok(Fmi2Res::OK),
            binding::fmi2Status_fmi2Warning => Ok(Fmi2Res::Warning),
            binding::fmi2Status_fmi2Discard => Err(Fmi2Error::Discard),
            binding::fmi2Status_fmi2Error => Err(Fmi2Error::Error),
            binding::fmi2Status_fmi2Fatal => Err(Fmi2Error::Fatal),
            binding::fmi2Status_fmi2Pending => Err(Fmi2Error::Pending),
            other => Err(Fmi2Error::Unknown(other)),
        }
    }
}
