#[tokio::main]
async fn main() -> std::process::ExitCode {
    adhd_helper::run().await
}
