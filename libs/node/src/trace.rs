use constellation_core::hop::complete_hop;
use constellation_core::{Hop, Reply, Request};

/// Identity a server records in the trace of every request it handles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    source: String,
    service_id: String,
    server_id: String,
}

impl Stamp {
    pub fn new(
        source: impl Into<String>,
        service_id: impl Into<String>,
        server_id: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            service_id: service_id.into(),
            server_id: server_id.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Append an open hop to the request's trace
    pub fn request(&self, request: &mut Request) {
        let hop = Hop::new(
            self.source.clone(),
            request.command.clone(),
            self.service_id.clone(),
            self.server_id.clone(),
        );
        request.push_hop(hop);
    }

    /// Close this server's hop in the reply's trace
    pub fn reply(&self, reply: &mut Reply) -> bool {
        complete_hop(&mut reply.trace, &self.source, &self.server_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use constellation_core::Parameters;

    #[test]
    fn request_hop_is_completed_on_reply() {
        let stamp = Stamp::new("inproc://ledger", "service", "instance-1");
        let mut request = Request::new("balance");
        stamp.request(&mut request);

        assert_eq!(request.trace.len(), 1);
        assert_eq!(request.trace[0].command, "balance");
        assert!(!request.trace[0].is_complete());

        let mut reply = Reply::ok(Parameters::new());
        reply.trace = request.trace.clone();
        assert!(stamp.reply(&mut reply));
        assert!(reply.trace[0].is_complete());
    }

    #[test]
    fn foreign_hops_are_left_open() {
        let stamp = Stamp::new("inproc://ledger", "service", "instance-1");
        let other = Stamp::new("inproc://proxy", "proxy", "instance-2");

        let mut request = Request::new("balance");
        other.request(&mut request);

        let mut reply = Reply::ok(Parameters::new());
        reply.trace = request.trace;
        assert!(!stamp.reply(&mut reply));
        assert!(!reply.trace[0].is_complete());
    }
}
