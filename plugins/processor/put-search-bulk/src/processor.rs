use std::future::Future;
use std::pin::Pin;

use rivulet_api::{FlowProcessor, FlowRecord, PluginError, ProcessSession, Relationship, Scheduling};

use crate::client::{BulkTransport, HttpBulkClient};
use crate::config::PutSearchBulkConfig;
use crate::request::{BulkRequestBuilder, OperationSpec};
use crate::response::{Reconciliation, Route, Submission, reconcile};

pub const REL_SUCCESS: Relationship = Relationship::new("success");
pub const REL_FAILURE: Relationship = Relationship::new("failure");
pub const REL_RETRY: Relationship = Relationship::new("retry");

/// Writes batches of records to a search backend through its bulk API.
pub struct PutSearchBulk {
    config: PutSearchBulkConfig,
    transport: Box<dyn BulkTransport>,
}

impl PutSearchBulk {
    pub fn from_config(config: PutSearchBulkConfig) -> Result<Self, PluginError> {
        config.validate()?;
        let client = HttpBulkClient::from_config(&config)?;
        Ok(Self {
            config,
            transport: Box::new(client),
        })
    }

    /// Same as `from_config` with a caller-supplied transport.
    pub fn with_transport(
        config: PutSearchBulkConfig,
        transport: Box<dyn BulkTransport>,
    ) -> Result<Self, PluginError> {
        config.validate()?;
        Ok(Self { config, transport })
    }

    fn resolve(&self, record: &FlowRecord) -> OperationSpec {
        let cfg = &self.config;
        OperationSpec {
            index: cfg.index.render(record),
            doc_type: cfg.doc_type.as_ref().map(|t| t.render(record)).unwrap_or_default(),
            id: cfg
                .id_attribute
                .as_deref()
                .and_then(|attr| record.attribute(attr))
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            operation: cfg.operation.render(record),
            script: cfg
                .script
                .as_ref()
                .map(|t| t.render(record))
                .filter(|s| !s.trim().is_empty()),
            upsert: cfg.upsert_option,
            charset: cfg.charset.render(record),
        }
    }

    async fn process(&self, session: &mut dyn ProcessSession) -> Scheduling {
        let records = session.get(self.config.batch_size);
        if records.is_empty() {
            return Scheduling::Continue;
        }

        let mut builder = BulkRequestBuilder::new();
        for record in records {
            let spec = self.resolve(&record);
            let content = record.content().to_vec();
            builder.push(record, &spec, &content);
        }
        let request = builder.finish();

        for excluded in request.excluded {
            tracing::error!(reason = %excluded.reason, "record excluded from bulk request, routing to failure");
            session.transfer(excluded.record, &REL_FAILURE);
        }
        if request.pending.is_empty() {
            return Scheduling::Continue;
        }

        tracing::debug!(
            records = request.pending.len(),
            bytes = request.payload.len(),
            endpoint = %self.transport.endpoint(),
            "submitting bulk request"
        );
        let submission = match self.transport.submit(request.payload).await {
            Ok(reply) => Submission::Reply(reply),
            Err(e) => Submission::Transport(e.to_string()),
        };

        let Reconciliation { outcomes, penalize, back_off } = reconcile(request.pending, submission);
        let endpoint = self.transport.endpoint();
        for (record, route) in outcomes {
            match route {
                Route::Success => {
                    session.report_send(&record, endpoint);
                    session.transfer(record, &REL_SUCCESS);
                }
                Route::Failure(_) => {
                    let record = if penalize { session.penalize(record) } else { record };
                    session.transfer(record, &REL_FAILURE);
                }
                Route::Retry => session.transfer(record, &REL_RETRY),
            }
        }

        if back_off { Scheduling::Yield } else { Scheduling::Continue }
    }
}

impl FlowProcessor for PutSearchBulk {
    fn relationships(&self) -> Vec<Relationship> {
        vec![REL_SUCCESS, REL_FAILURE, REL_RETRY]
    }

    fn on_trigger<'a>(
        &'a self,
        session: &'a mut dyn ProcessSession,
    ) -> Pin<Box<dyn Future<Output = Result<Scheduling, PluginError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.process(session).await) })
    }
}
