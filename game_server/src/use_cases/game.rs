use super::simulation::Simulation;
use super::throttle::{should_log, throttle_origin};
use super::types::{GameEvent, SimulationSettings};
use crate::domain::ConnectionId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use sync_core::protocol::SyncUpdate;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Per-connection outbound queue owned by the world task.
struct Outbound {
    tx: mpsc::Sender<SyncUpdate>,
    last_full_log: Instant,
}

pub async fn world_task(
    mut input_rx: mpsc::Receiver<GameEvent>,
    settings: SimulationSettings,
    shutdown: Arc<Notify>,
) {
    let tick_interval = settings.tick_interval;
    let mut sim = Simulation::new(settings);
    let mut outbound: HashMap<ConnectionId, Outbound> = HashMap::new();

    // Drive the fixed-step game loop at the configured tick rate.
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!(tick = sim.current_tick(), "world task shutting down");
                break;
            }
            _ = interval.tick() => {}
        }

        // Everything that arrived since the last tick is applied before it runs.
        while let Ok(ev) = input_rx.try_recv() {
            handle_event(&mut sim, &mut outbound, ev);
        }

        let report = sim.tick();
        if report.rejected > 0 || !report.despawned.is_empty() {
            debug!(
                tick = report.tick,
                applied = report.applied,
                rejected = report.rejected,
                despawned = report.despawned.len(),
                "tick"
            );
        }

        send_updates(&mut sim, &mut outbound);
        sim.finish_tick();
    }
}

fn handle_event(sim: &mut Simulation, outbound: &mut HashMap<ConnectionId, Outbound>, ev: GameEvent) {
    match ev {
        GameEvent::Join {
            conn_id,
            player_id,
            display_name,
            class,
            outbound: tx,
            reply,
        } => {
            let accepted = sim.join(conn_id, player_id, display_name, class);
            outbound.insert(
                conn_id,
                Outbound {
                    tx,
                    last_full_log: throttle_origin(),
                },
            );
            if reply.send(accepted).is_err() {
                // The connection went away while joining.
                sim.leave(conn_id);
                outbound.remove(&conn_id);
            }
        }
        GameEvent::Leave { conn_id } => {
            outbound.remove(&conn_id);
            sim.leave(conn_id);
        }
        GameEvent::Input { conn_id, command } => {
            sim.enqueue(conn_id, command);
        }
        GameEvent::Latency { conn_id, rtt } => {
            sim.record_latency(conn_id, rtt);
        }
        GameEvent::QueryPosition {
            entity_id,
            at_ms,
            reply,
        } => {
            let _ = reply.send(sim.position_at(entity_id, at_ms));
        }
        GameEvent::QuerySnapshot { reply } => {
            let _ = reply.send(sim.snapshot());
        }
    }
}

/// Builds and hands off each connection's update; the sync cache only
/// advances for updates that were actually queued.
fn send_updates(sim: &mut Simulation, outbound: &mut HashMap<ConnectionId, Outbound>) {
    let mut closed = Vec::new();
    for conn_id in sim.connection_ids() {
        let Some(out) = outbound.get_mut(&conn_id) else {
            continue;
        };
        let Some((update, pending)) = sim.build_update(conn_id) else {
            continue;
        };
        match out.tx.try_send(update) {
            Ok(()) => sim.commit_update(conn_id, &pending),
            Err(TrySendError::Full(_)) => {
                if should_log(&mut out.last_full_log) {
                    warn!(conn_id, "outbound queue full; skipping sync update");
                }
            }
            Err(TrySendError::Closed(_)) => closed.push(conn_id),
        }
    }

    for conn_id in closed {
        info!(conn_id, "outbound closed; removing connection");
        outbound.remove(&conn_id);
        sim.leave(conn_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::types::JoinAccepted;
    use std::time::Duration;
    use sync_core::{ActionFlags, CharacterClass, InputCommand};
    use tokio::sync::oneshot;

    fn fast_settings() -> SimulationSettings {
        SimulationSettings {
            tick_interval: Duration::from_millis(5),
            monster_count: 2,
            ..SimulationSettings::default()
        }
    }

    async fn join(
        input_tx: &mpsc::Sender<GameEvent>,
        conn_id: ConnectionId,
    ) -> (JoinAccepted, mpsc::Receiver<SyncUpdate>) {
        let (tx, rx) = mpsc::channel(64);
        let (reply_tx, reply_rx) = oneshot::channel();
        input_tx
            .send(GameEvent::Join {
                conn_id,
                player_id: conn_id,
                display_name: format!("p{conn_id}"),
                class: CharacterClass::Warrior,
                outbound: tx,
                reply: reply_tx,
            })
            .await
            .unwrap();
        (reply_rx.await.unwrap(), rx)
    }

    #[tokio::test]
    async fn when_player_joins_then_first_update_carries_full_entities() {
        let (input_tx, input_rx) = mpsc::channel(64);
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(world_task(input_rx, fast_settings(), shutdown.clone()));

        let (accepted, mut updates) = join(&input_tx, 7).await;
        let first = updates.recv().await.unwrap();

        assert!(first.entity_deltas.iter().all(|d| d.full));
        assert!(first
            .entity_deltas
            .iter()
            .any(|d| d.entity.id == accepted.entity_id));

        shutdown.notify_one();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn when_input_is_sent_then_acknowledgement_follows() {
        let (input_tx, input_rx) = mpsc::channel(64);
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(world_task(input_rx, fast_settings(), shutdown.clone()));

        let (_, mut updates) = join(&input_tx, 8).await;
        input_tx
            .send(GameEvent::Input {
                conn_id: 8,
                command: InputCommand {
                    sequence: 1,
                    timestamp_ms: 0,
                    move_x: 1.0,
                    move_y: 0.0,
                    aim: 0.0,
                    delta_time_ms: 16,
                    actions: ActionFlags::default(),
                },
            })
            .await
            .unwrap();

        let acked = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(update) = updates.recv().await {
                if update.last_processed_sequence == 1 {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);
        assert!(acked);

        shutdown.notify_one();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn when_snapshot_is_queried_then_it_lists_connections_and_entities() {
        let (input_tx, input_rx) = mpsc::channel(64);
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(world_task(input_rx, fast_settings(), shutdown.clone()));
        let (_accepted, _updates) = join(&input_tx, 9).await;

        let (reply, rx) = oneshot::channel();
        input_tx
            .send(GameEvent::QuerySnapshot { reply })
            .await
            .unwrap();
        let snapshot = rx.await.unwrap();

        assert_eq!(snapshot.last_processed_sequences.get(&9), Some(&0));
        assert_eq!(snapshot.entities.len(), 3);

        shutdown.notify_one();
        task.await.unwrap();
    }
}
