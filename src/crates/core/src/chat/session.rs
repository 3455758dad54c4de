/// The conversation the client is currently attached to.
///
/// Only ever replaced wholesale: [`SessionHandle::replace`] on init,
/// [`SessionHandle::invalidate`] on reset and dispose.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionHandle {
    id: Option<String>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn replace(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn invalidate(&mut self) {
        self.id = None;
    }
}
