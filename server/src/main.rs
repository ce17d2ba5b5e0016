#[tokio::main]
async fn main() {
    reunitems::start_server().await;
}
