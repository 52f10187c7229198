use mock_service::{MockConfig, MockService};
use std::sync::OnceLock;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub async fn init(config: MockConfig) -> MockService {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter("loadgen=debug,mock_service=debug,axum::rejection=trace")
            .try_init();
    });

    mock_service::spawn(config)
        .await
        .expect("mock service failed to bind")
}
