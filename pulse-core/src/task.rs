use tokio::task::JoinHandle;

/// A background loop owned by whoever holds the handle. Dropping the handle
/// aborts the loop.
pub struct TaskHandle {
    name: String,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub(crate) fn new(name: impl Into<String>, handle: JoinHandle<()>) -> Self {
        Self {
            name: name.into(),
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn stop(self) {}
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.handle.abort();
        tracing::debug!("Stopped {}", self.name);
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}
