#[tokio::main]
async fn main() -> Result<(), game_client::interface_adapters::ClientNetError> {
    game_client::run_with_config().await
}
