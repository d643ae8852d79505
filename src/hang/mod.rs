use crate::session::{CallFrame, SessionConfig, SessionManager, SessionState};
use crate::{Error, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What `detect` was asked to run (§4.8).
pub struct HangRequest {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<String>,
    pub timeout: Duration,
    pub sample_interval: Duration,
}

/// A sampled top-frame location, compared across the ring by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleLocation {
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub enum HangOutcome {
    Completed {
        exit_code: Option<i32>,
        duration: Duration,
    },
    Loop {
        location: SampleLocation,
        stack: Vec<CallFrame>,
        duration: Duration,
    },
    Hung {
        location: Option<SampleLocation>,
        stack: Vec<CallFrame>,
        duration: Duration,
    },
}

/// Drops a session's handle, guaranteeing teardown even if the sampler
/// loop panics mid-iteration: `Drop` still runs during unwind, and
/// `Session::stop` is idempotent so a prior explicit call costs nothing.
struct SessionGuard(Arc<crate::session::Session>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let session = self.0.clone();
        tokio::spawn(async move {
            let _ = session.stop().await;
        });
    }
}

/// Runs a bounded-lifetime session and classifies it as completed,
/// looping, or hung by sampling its top frame (§4.8).
pub struct HangDetector {
    manager: Arc<SessionManager>,
}

impl HangDetector {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    pub async fn detect(&self, req: HangRequest) -> Result<HangOutcome> {
        let ring_size = ((5000f64 / req.sample_interval.as_millis().max(1) as f64).ceil() as usize).max(20);

        let session = self
            .manager
            .create(SessionConfig {
                command: req.command,
                args: req.args,
                cwd: req.cwd,
            })
            .await
            .map_err(|e| Error::HangDetectionFailed(e.to_string()))?;
        let guard = SessionGuard(session.clone());

        session.resume().await.map_err(|e| Error::HangDetectionFailed(e.to_string()))?;

        let start = Instant::now();
        let deadline = start + req.timeout;
        let mut ring: VecDeque<SampleLocation> = VecDeque::with_capacity(ring_size);
        let mut ticker = tokio::time::interval(req.sample_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let outcome = loop {
            if let Some(status) = session.try_wait_child().await {
                break HangOutcome::Completed {
                    exit_code: status.code(),
                    duration: start.elapsed(),
                };
            }

            if Instant::now() >= deadline {
                let stack = session.get_stack().await.unwrap_or_default();
                break HangOutcome::Hung {
                    location: ring.back().cloned(),
                    stack,
                    duration: start.elapsed(),
                };
            }

            ticker.tick().await;

            if let Some(status) = session.try_wait_child().await {
                break HangOutcome::Completed {
                    exit_code: status.code(),
                    duration: start.elapsed(),
                };
            }

            if let Some((location, stack)) = self.sample(&session).await {
                if ring.len() == ring_size {
                    ring.pop_front();
                }
                ring.push_back(location.clone());

                if ring.len() == ring_size && ring.iter().all(|l| *l == location) {
                    break HangOutcome::Loop {
                        location,
                        stack,
                        duration: start.elapsed(),
                    };
                }
            }
        };

        drop(guard);
        session.stop().await.map_err(|e| Error::HangDetectionFailed(e.to_string()))?;
        Ok(outcome)
    }

    /// Pause, read the top frame, resume. Any transient state race
    /// (pause arriving before the runtime settles into `Running`) just
    /// drops this sample rather than failing the whole detection.
    async fn sample(&self, session: &Arc<crate::session::Session>) -> Option<(SampleLocation, Vec<CallFrame>)> {
        session.pause().await.ok()?;

        for _ in 0..20 {
            if session.state().await == SessionState::Paused {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        if session.state().await != SessionState::Paused {
            return None;
        }

        let stack = session.get_stack().await.ok()?;
        let top = stack.first()?;
        let location = SampleLocation {
            file: top.file.clone(),
            line: top.line,
        };
        let _ = session.resume().await;
        Some((location, stack))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_size_is_at_least_twenty() {
        let size = ((5000f64 / 1000f64).ceil() as usize).max(20);
        assert_eq!(size, 20);
    }

    #[test]
    fn ring_size_scales_with_sample_interval() {
        let size = ((5000f64 / 100f64).ceil() as usize).max(20);
        assert_eq!(size, 50);
    }
}
