use std::ffi::CStr;

use super::{
    fmi2ComponentEnvironment, fmi2Status, fmi2Status_fmi2Discard, fmi2Status_fmi2Error,
    fmi2Status_fmi2Fatal, fmi2Status_fmi2OK, fmi2Status_fmi2Pending, fmi2Status_fmi2Warning,
    fmi2String,
};

unsafe fn str_or<'a>(ptr: fmi2String, default: &'a str) -> &'a str {
    if ptr.is_null() {
        default
    } else {
        CStr::from_ptr(ptr).to_str().unwrap_or(default)
    }
}

/// Map an FMI status reported through the logger callback to a log level.
pub fn status_level(status: fmi2Status) -> log::Level {
    match status {
        fmi2Status_fmi2OK => log::Level::Info,
        fmi2Status_fmi2Warning => log::Level::Warn,
        fmi2Status_fmi2Discard => log::Level::Trace,
        fmi2Status_fmi2Error | fmi2Status_fmi2Fatal => log::Level::Error,
        fmi2Status_fmi2Pending => log::Level::Debug,
        _ => log::Level::Error,
    }
}

/// This function gets called from logger.c
#[no_mangle]
extern "C" fn callback_log(
    _component_environment: fmi2ComponentEnvironment,
    instance_name: fmi2String,
    status: fmi2Status,
    category: fmi2String,
    message: fmi2String,
) {
    let instance_name = unsafe { str_or(instance_name, "NULL") };
    let category = unsafe { str_or(category, "") };
    let message = unsafe { str_or(message, "") };

    log::logger().log(
        &log::Record::builder()
            .args(format_args!("[{category}] {message}"))
            .level(status_level(status))
            .module_path(Some("logger"))
            .target(instance_name)
            .build(),
    );
}

#[link(name = "cosimlogger", kind = "static")]
extern "C" {
    /// This function is implemented in logger.c
    /// Note: This can be re-implemented in pure Rust once the `c_variadics` feature stabilizes.
    pub fn callback_logger_handler(
        componentEnvironment: fmi2ComponentEnvironment,
        instanceName: fmi2String,
        status: fmi2Status,
        category: fmi2String,
        message: fmi2String,
        ...
    );
}
