//! Periodic refresh loops.
//!
//! One independent task per timer so a slow upstream never delays the
//! others. Ticks are skipped (never backlogged) under slow progress, and
//! every loop exits promptly when the shutdown channel fires; work in
//! flight at that moment is abandoned.
use crate::app::AppState;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub fn spawn_refresh_tasks(
    state: &AppState,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let config = &state.config;
    let minutes = |m: u64| Duration::from_secs(m.max(1) * 60);
    let seconds = |s: u64| Duration::from_secs(s.max(1));

    let mut tasks = Vec::new();

    let eks = state.eks.clone();
    tasks.push(spawn_periodic(
        "eksCredentialsRefresh",
        minutes(config.eks_credentials_refresh_interval),
        shutdown.clone(),
        move || {
            let eks = eks.clone();
            async move {
                if let Err(err) = eks.refresh() {
                    tracing::warn!(error = %format!("{err:#}"), "eks credentials refresh failed");
                }
            }
        },
    ));

    let sticr = state.sticr.clone();
    tasks.push(spawn_periodic(
        "sticrHostRefresh",
        minutes(config.sticr_file_check_interval),
        shutdown.clone(),
        move || {
            let sticr = sticr.clone();
            async move {
                if let Err(err) = sticr.refresh() {
                    tracing::warn!(error = %format!("{err:#}"), "sticr host refresh failed");
                }
            }
        },
    ));

    let roots = state.roots.clone();
    let roots_client = state.keyservice.clone();
    tasks.push(spawn_periodic(
        "rootCertsRefresh",
        seconds(config.root_certs_fetch_interval),
        shutdown.clone(),
        move || {
            let roots = roots.clone();
            let client = roots_client.clone();
            async move {
                if let Err(err) = roots.refresh(&client).await {
                    tracing::warn!(error = %format!("{err:#}"), "root certs refresh failed");
                }
            }
        },
    ));

    let signing = state.signing.clone();
    let signing_client = state.keyservice.clone();
    tasks.push(spawn_periodic(
        "signingCredentialsRefresh",
        seconds(config.signing_credentials_fetch_interval),
        shutdown.clone(),
        move || {
            let signing = signing.clone();
            let client = signing_client.clone();
            async move {
                if let Err(err) = signing.refresh(&client).await {
                    tracing::warn!(error = %format!("{err:#}"), "signing credentials refresh failed");
                }
            }
        },
    ));

    let replay = state.replay.clone();
    tasks.push(spawn_periodic(
        "replayAttackCacheValidation",
        seconds(config.replay_attack_cache_validation_interval),
        shutdown.clone(),
        move || {
            let replay = replay.clone();
            async move {
                replay.sweep(crate::now_epoch_seconds());
            }
        },
    ));

    let pubkeys = state.pubkeys.clone();
    tasks.push(spawn_periodic(
        "publicKeysCacheFlush",
        seconds(config.public_keys_cache_flush_interval),
        shutdown,
        move || {
            let pubkeys = pubkeys.clone();
            async move {
                let flushed = pubkeys.len();
                pubkeys.flush();
                tracing::debug!(entries = flushed, "flushed public key cache");
            }
        },
    ));

    tasks
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; consume it so the first
        // refresh runs one full period after spawn.
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    tokio::select! {
                        _ = tick() => {}
                        _ = shutdown.changed() => {
                            tracing::info!(timer = name, "stopped refresh timer");
                            return;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!(timer = name, "stopped refresh timer");
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn periodic_task_ticks_and_stops_on_shutdown() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let task = spawn_periodic("test", Duration::from_secs(1), shutdown_rx, move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(counter.load(Ordering::SeqCst) >= 2);

        shutdown_tx.send(true).expect("send shutdown");
        task.await.expect("task exits cleanly");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_before_first_tick_exits_immediately() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = spawn_periodic(
            "test",
            Duration::from_secs(3600),
            shutdown_rx,
            || async {},
        );
        shutdown_tx.send(true).expect("send shutdown");
        task.await.expect("task exits without waiting a period");
    }
}
