//! Pause gate: pause, resume, toggle.
//!
//! The flag lives in controller state and is mirrored to the options store
//! so a restart comes back in the same mode.

use tracing::info;

use super::manager::{ControllerState, QueueController};
use super::options::QUEUE_PAUSED;
use crate::error::QueueResult;
use crate::protocol::QueueEvent;

impl QueueController {
    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Stop dispatch. Returns false if already paused.
    pub fn pause(&self) -> QueueResult<bool> {
        self.set_paused(true)
    }

    /// Restart dispatch. Returns false if not paused.
    pub fn resume(&self) -> QueueResult<bool> {
        self.set_paused(false)
    }

    /// Flip the gate and return the new paused state.
    pub fn toggle(&self) -> QueueResult<bool> {
        let paused = {
            let mut state = self.state.lock();
            let paused = !state.paused;
            self.apply_paused_locked(&mut state, paused)?;
            paused
        };
        self.announce_paused(paused);
        Ok(paused)
    }

    pub fn set_paused(&self, paused: bool) -> QueueResult<bool> {
        {
            let mut state = self.state.lock();
            if state.paused == paused {
                return Ok(false);
            }
            self.apply_paused_locked(&mut state, paused)?;
        }
        self.announce_paused(paused);
        Ok(true)
    }

    fn apply_paused_locked(&self, state: &mut ControllerState, paused: bool) -> QueueResult<()> {
        self.options.set(QUEUE_PAUSED, &paused)?;
        state.paused = paused;

        if paused {
            // Consumers blocked on "item available" wake up and park on the gate
            state.front.clear();
            self.item_ready.notify_all();
        } else {
            self.unpaused.notify_all();
        }
        Ok(())
    }

    fn announce_paused(&self, paused: bool) {
        info!(paused, "Queue playback toggled");
        self.notify(QueueEvent::PlaybackToggled { paused });
    }
}
