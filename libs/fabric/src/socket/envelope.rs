use crate::transport::Multipart;

/// Routing frames that lead a message, ending at an empty delimiter frame
///
/// A router socket prefixes each inbound message with the identity of the
/// connection it came from, so after passing through brokers a message
/// looks like `[identity.., "", body..]`. Replies are sent back by wrapping
/// the body in the same envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    routing: Vec<Vec<u8>>,
}

impl Envelope {
    pub fn new(routing: Vec<Vec<u8>>) -> Self {
        Self { routing }
    }

    /// Split a message at its first empty frame
    ///
    /// A message without a delimiter is treated as a bare identity frame
    /// followed by the body.
    pub fn split(mut message: Multipart) -> (Self, Multipart) {
        match message.iter().position(Vec::is_empty) {
            Some(delimiter) => {
                let body = message.split_off(delimiter + 1);
                message.truncate(delimiter);
                (Self::new(message), body)
            }
            None if message.is_empty() => (Self::default(), message),
            None => {
                let body = message.split_off(1);
                (Self::new(message), body)
            }
        }
    }

    /// Build `[routing.., "", body..]`
    pub fn wrap(&self, body: impl IntoIterator<Item = Vec<u8>>) -> Multipart {
        let mut message = self.routing.clone();
        message.push(Vec::new());
        message.extend(body);
        message
    }

    pub fn routing(&self) -> &[Vec<u8>] {
        &self.routing
    }

    /// The outermost identity, the one a router socket routes on
    pub fn identity(&self) -> Option<&[u8]> {
        self.routing.first().map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.routing.is_empty()
    }
}
