use crate::application::Services;

#[derive(Clone)]
pub struct HttpState {
    pub services: Services,
}

impl HttpState {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}
