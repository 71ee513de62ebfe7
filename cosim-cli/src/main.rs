fn main() -> anyhow::Result<()> {
    cosim_cli::entrypoint()
}
