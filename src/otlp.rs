//! OTLP gRPC ingress — authenticates a batch, splits it into per-span items,
//! and enqueues them onto the batcher's channel (spec §4.C).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use opentelemetry_proto::tonic::collector::trace::v1::{
    trace_service_server::{TraceService, TraceServiceServer},
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use tonic::{transport::Server, Request, Response, Status};
use tracing::info;

use crate::attrs::{self, AttrMap, AttrValue};
use crate::builder::OtlpSpanItem;
use crate::error::IngestError;
use crate::project::{Dsn, ProjectStore};

/// Test/transport hook: a layer in front of this service may stash one of
/// these in the request extensions so `export` can reject already-cancelled
/// calls before doing any work (spec §4.C, §5 "ingress uses the request
/// context only to reject already-cancelled calls before parsing").
#[derive(Clone)]
pub struct CancelFlag(pub Arc<AtomicBool>);

fn is_cancelled<T>(request: &Request<T>) -> bool {
    request.extensions().get::<CancelFlag>().map(|f| f.0.load(Ordering::Relaxed)).unwrap_or(false)
}

pub struct IngestionService {
    project_store: Arc<dyn ProjectStore>,
    sender: tokio::sync::mpsc::Sender<OtlpSpanItem>,
}

impl IngestionService {
    pub fn new(project_store: Arc<dyn ProjectStore>, sender: tokio::sync::mpsc::Sender<OtlpSpanItem>) -> Self {
        Self { project_store, sender }
    }
}

#[tonic::async_trait]
impl TraceService for IngestionService {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<Response<ExportTraceServiceResponse>, Status> {
        if is_cancelled(&request) {
            return Err(IngestError::Cancelled.into());
        }

        if request.metadata().len() == 0 {
            return Err(IngestError::MissingMetadata.into());
        }
        let dsn_header = request.metadata().get("uptrace-dsn").ok_or(IngestError::MissingDsn)?;
        let dsn_str = dsn_header.to_str().map_err(|e| IngestError::InvalidDsn(e.to_string()))?;
        let dsn = Dsn::parse(dsn_str).map_err(IngestError::from)?;

        let project = self
            .project_store
            .find_by_token(&dsn.token)
            .ok_or_else(|| IngestError::UnknownProject(dsn.token.clone()))?;

        let req = request.into_inner();
        let mut enqueued = 0usize;

        for resource_spans in req.resource_spans {
            let mut resource = AttrMap::new();
            if let Some(res) = &resource_spans.resource {
                attrs::merge_key_values(&mut resource, &res.attributes);
            }

            for scope_spans in resource_spans.scope_spans {
                // Each scope gets its own clone of the resource map before the
                // library attributes are overlaid, rather than mutating one
                // shared map across scopes (design note: the upstream source
                // mutates a single shared map here, so a second scope's
                // library name silently clobbers the first's for any span
                // still holding a reference to it).
                let mut scope_resource = resource.clone();
                if let Some(scope) = &scope_spans.scope {
                    scope_resource.insert("otel.library.name".to_string(), AttrValue::String(scope.name.clone()));
                    if !scope.version.is_empty() {
                        scope_resource
                            .insert("otel.library.version".to_string(), AttrValue::String(scope.version.clone()));
                    }
                }

                for span in scope_spans.spans {
                    let item = OtlpSpanItem { project: project.clone(), wire: span, resource: scope_resource.clone() };
                    if self.sender.send(item).await.is_err() {
                        tracing::warn!("ingress channel closed, dropping remainder of batch");
                        return Ok(Response::new(ExportTraceServiceResponse { partial_success: None }));
                    }
                    enqueued += 1;
                }
            }
        }

        tracing::debug!(spans = enqueued, project_id = project.id, "batch enqueued");
        Ok(Response::new(ExportTraceServiceResponse { partial_success: None }))
    }
}

pub async fn run_otlp_server(service: IngestionService, addr: &str) -> anyhow::Result<()> {
    let addr = addr.parse()?;
    info!("OTLP gRPC server listening on {}", addr);

    Server::builder()
        .add_service(TraceServiceServer::new(service))
        .serve(addr)
        .await?;

    Ok(())
}
