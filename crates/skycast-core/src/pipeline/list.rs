//! LIST: report installed subscriptions.

use skycast_proto::{ListEntry, ListResponse};

use super::Decoder;
use crate::{error::DecoderError, storage::Storage};

impl<S: Storage> Decoder<S> {
    /// Build the LIST response from populated slots in slot order.
    ///
    /// # Errors
    ///
    /// - `UnexpectedBody` if the request carried any body bytes
    pub fn list(&self, body: &[u8]) -> Result<ListResponse, DecoderError> {
        if !body.is_empty() {
            return Err(DecoderError::UnexpectedBody { len: body.len() });
        }

        let entries = self
            .store
            .entries()
            .map(|(_, record)| ListEntry {
                channel: record.channel(),
                start: record.start(),
                end: record.end(),
            })
            .collect();

        Ok(ListResponse { entries })
    }
}
