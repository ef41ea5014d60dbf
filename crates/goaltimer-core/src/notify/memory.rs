use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{NotificationBackend, NotificationKind, ScheduleRequest, TapResponse};
use crate::error::NotificationError;
use crate::goal::GoalId;

#[derive(Debug)]
struct State {
    scheduled: BTreeMap<(GoalId, NotificationKind), ScheduleRequest>,
    presented: Vec<(GoalId, DateTime<Utc>)>,
    cancelled: Vec<GoalId>,
    permission: bool,
    failing: bool,
}

/// Notification backend that records every call. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryNotificationBackend {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryNotificationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNotificationBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                scheduled: BTreeMap::new(),
                presented: Vec::new(),
                cancelled: Vec::new(),
                permission: true,
                failing: false,
            })),
        }
    }

    pub fn deny_permission(&self) {
        self.lock().permission = false;
    }

    pub fn fail_schedules(&self, on: bool) {
        self.lock().failing = on;
    }

    /// Pending deadline requests, ordered by goal id.
    pub fn scheduled(&self) -> Vec<ScheduleRequest> {
        self.pending_of(NotificationKind::Deadline)
    }

    /// Pending warning requests, ordered by goal id.
    pub fn warnings(&self) -> Vec<ScheduleRequest> {
        self.pending_of(NotificationKind::Warning)
    }

    pub fn scheduled_for(&self, goal_id: &GoalId) -> Option<ScheduleRequest> {
        self.lock()
            .scheduled
            .get(&(goal_id.clone(), NotificationKind::Deadline))
            .cloned()
    }

    pub fn presented(&self) -> Vec<GoalId> {
        self.lock().presented.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Immediate notifications with the time they were shown.
    pub fn presented_at(&self) -> Vec<(GoalId, DateTime<Utc>)> {
        self.lock().presented.clone()
    }

    fn pending_of(&self, kind: NotificationKind) -> Vec<ScheduleRequest> {
        self.lock()
            .scheduled
            .values()
            .filter(|req| req.payload.kind == kind)
            .cloned()
            .collect()
    }

    pub fn cancelled(&self) -> Vec<GoalId> {
        self.lock().cancelled.clone()
    }

    /// Fire every request due at `now`, as the OS would, and return the
    /// payloads a user would tap.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<TapResponse> {
        let mut state = self.lock();
        let mut due: Vec<ScheduleRequest> = state
            .scheduled
            .values()
            .filter(|req| req.fires_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|req| req.fires_at);
        for req in &due {
            state.scheduled.remove(&(req.payload.goal_id.clone(), req.payload.kind));
        }
        due.into_iter().map(|req| req.payload).collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl NotificationBackend for MemoryNotificationBackend {
    fn request_permission(&mut self) -> Result<bool, NotificationError> {
        Ok(self.lock().permission)
    }

    fn schedule(&mut self, request: &ScheduleRequest) -> Result<(), NotificationError> {
        let mut state = self.lock();
        if state.failing {
            return Err(NotificationError::Backend("injected schedule failure".into()));
        }
        let (goal_id, kind) = request.key();
        state.scheduled.insert((goal_id.clone(), kind), request.clone());
        Ok(())
    }

    fn cancel(&mut self, goal_id: &GoalId) -> Result<(), NotificationError> {
        let mut state = self.lock();
        let before = state.scheduled.len();
        state.scheduled.retain(|(id, _), _| id != goal_id);
        if state.scheduled.len() != before {
            state.cancelled.push(goal_id.clone());
        }
        Ok(())
    }

    fn present_now(
        &mut self,
        goal_id: &GoalId,
        _title: &str,
        _body: &str,
        at: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        self.lock().presented.push((goal_id.clone(), at));
        Ok(())
    }
}
