use std::sync::Arc;

use audit_ledger::LedgerSink;
use wire_proxy::{DialogContext, ObserverFactory, ObserverPair, TapEndpoint};

use crate::extractor::{ResponseTap, StreamExtractor};

/// Builds the matched extractor pair for each MongoDB dialog.
///
/// The incoming (client→backend) endpoint gets a full [`StreamExtractor`];
/// the outgoing endpoint a [`ResponseTap`]. Both share the dialog context so
/// identity resolved from requests is visible on events from either side.
pub struct MongoTapFactory {
    sink: LedgerSink,
}

impl MongoTapFactory {
    pub fn new(sink: LedgerSink) -> Self {
        Self { sink }
    }
}

impl ObserverFactory for MongoTapFactory {
    fn create(&self, dialog: &Arc<DialogContext>) -> ObserverPair {
        ObserverPair {
            incoming: Arc::new(StreamExtractor::new(Arc::clone(dialog), self.sink.clone()))
                as Arc<dyn TapEndpoint>,
            outgoing: Arc::new(ResponseTap::new(Arc::clone(dialog))) as Arc<dyn TapEndpoint>,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_dialog_gets_a_fresh_pair() {
        let (sink, _rx) = LedgerSink::channel();
        let factory = MongoTapFactory::new(sink);

        let dialog = Arc::new(DialogContext::new("127.0.0.1:51000".parse().unwrap()));
        let pair = factory.create(&dialog);

        // Both endpoints honor the write contract from the start.
        assert!(pair.incoming.write(&[]).is_ok());
        assert!(pair.outgoing.write(b"reply bytes").is_ok());
    }
}
