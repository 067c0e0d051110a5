#[tokio::main]
async fn main() {
    medcenter::run().await;
}
