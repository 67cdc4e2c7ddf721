#[tokio::main]
async fn main() {
    relais::boot::boot().await;
}
