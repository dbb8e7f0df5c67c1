use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    clock::{Clock, TimerHandle},
    events::{EventBus, TrialEvent},
};

use super::{TargetGenerator, TargetOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRunOutcome {
    Completed { hits: u32, expired: u32 },
    Cancelled,
}

/// Drives one reaction run: spawn, wait for a hit or the expiry, repeat until the generator
/// is exhausted. Hits arrive on `hits` as target indices.
pub async fn run_targets(
    mut generator: TargetGenerator,
    clock: Clock,
    events: EventBus,
    session_id: String,
    mut hits: mpsc::UnboundedReceiver<u32>,
    cancel_token: CancellationToken,
) -> TargetRunOutcome {
    let config = generator.config().clone();
    let mut popups: Vec<TimerHandle> = Vec::new();
    let mut next_popup_id: u64 = 0;
    let mut hit_count: u32 = 0;
    let mut expired_count: u32 = 0;
    let mut hits_open = true;

    loop {
        tokio::select! {
            _ = clock.sleep(config.respawn_delay) => {}
            _ = cancel_token.cancelled() => return cancelled(&session_id, popups),
        }

        if generator.is_exhausted() {
            break;
        }

        let target = match generator.spawn(clock.now()) {
            Ok(target) => target,
            Err(err) => {
                error!("target spawn failed for session {}: {err}", session_id);
                break;
            }
        };
        debug!(
            "target {}/{} spawned at ({:.0}, {:.0}) for session {}",
            target.index, config.max_targets, target.x, target.y, session_id
        );
        events.emit(TrialEvent::TargetSpawned {
            session_id: session_id.clone(),
            target: target.clone(),
            at_ms: clock.elapsed_ms(),
        });

        let expiry = clock.sleep(config.target_lifetime);
        tokio::pin!(expiry);

        let resolved = loop {
            tokio::select! {
                _ = &mut expiry => {
                    break generator.resolve(target.index, TargetOutcome::Expired, clock.now());
                }
                hit = hits.recv(), if hits_open => match hit {
                    Some(index) if index == target.index => {
                        break generator.resolve(index, TargetOutcome::Hit, clock.now());
                    }
                    Some(index) => debug!("ignoring hit on inactive target {index}"),
                    None => hits_open = false,
                },
                _ = cancel_token.cancelled() => return cancelled(&session_id, popups),
            }
        };

        let Some(resolved) = resolved else {
            error!("target {} vanished before resolution", target.index);
            break;
        };

        let reaction_ms = resolved.reaction_ms();
        match resolved.outcome {
            Some(TargetOutcome::Hit) => hit_count += 1,
            _ => expired_count += 1,
        }

        events.emit(TrialEvent::TargetResolved {
            session_id: session_id.clone(),
            index: resolved.index,
            outcome: resolved.outcome.unwrap_or(TargetOutcome::Expired),
            reaction_ms,
            resolved: generator.resolved_count(),
        });

        if let Some(reaction_ms) = reaction_ms {
            next_popup_id += 1;
            let popup_id = next_popup_id;
            events.emit(TrialEvent::ReactionTimeShown {
                popup_id,
                index: resolved.index,
                reaction_ms,
            });

            let popup_events = events.clone();
            popups.retain(|popup| !popup.is_finished());
            popups.push(clock.schedule_once(config.popup_lifetime, move || async move {
                popup_events.emit(TrialEvent::ReactionTimeCleared { popup_id });
            }));
        }
    }

    tokio::select! {
        _ = clock.sleep(config.completion_delay) => {}
        _ = cancel_token.cancelled() => return cancelled(&session_id, popups),
    }

    info!(
        "reaction run finished for session {}: {} hits, {} expired",
        session_id, hit_count, expired_count
    );
    TargetRunOutcome::Completed {
        hits: hit_count,
        expired: expired_count,
    }
}

fn cancelled(session_id: &str, popups: Vec<TimerHandle>) -> TargetRunOutcome {
    for popup in &popups {
        popup.cancel();
    }
    debug!("reaction run cancelled for session {}", session_id);
    TargetRunOutcome::Cancelled
}
