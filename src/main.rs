use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    agentkvm_lib::run().await
}
