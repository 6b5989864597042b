//! XML-RPC over HTTP implementation of [`NeosService`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{NeosError, NeosResult};
use crate::job::{JobCredential, JobId, SubmitOptions};
use crate::result::ResultChunk;
use crate::service::NeosService;
use crate::xmlrpc::{self, Value};

/// Talks to a NEOS server with XML-RPC method calls over HTTP POST.
#[derive(Debug, Clone)]
pub struct XmlRpcService {
    endpoint: String,
    client: Client,
}

impl XmlRpcService {
    /// Create a service for the endpoint described by `config`.
    pub fn new(config: &ClientConfig) -> NeosResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(config.endpoint(), client))
    }

    /// Create a service with a preconfigured HTTP client.
    pub fn with_client(endpoint: impl Into<String>, client: Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    /// URL every call is posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Perform one remote procedure call.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> NeosResult<Value> {
        debug!(method, endpoint = %self.endpoint, "XML-RPC call");
        let body = xmlrpc::encode_call(method, &params);
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NeosError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        xmlrpc::decode_response(&text)
    }

    async fn call_text(&self, method: &str, params: Vec<Value>) -> NeosResult<String> {
        self.call(method, params).await?.into_text()
    }
}

fn job_params(job: JobId, credential: &JobCredential) -> NeosResult<Vec<Value>> {
    Ok(vec![Value::Int(wire_int(job.0)?), credential.expose().into()])
}

fn wire_int(n: u64) -> NeosResult<i64> {
    i64::try_from(n).map_err(|_| NeosError::malformed(format!("{n} does not fit an XML-RPC int")))
}

#[async_trait]
impl NeosService for XmlRpcService {
    async fn ping(&self) -> NeosResult<String> {
        self.call_text("ping", vec![]).await
    }

    async fn version(&self) -> NeosResult<String> {
        self.call_text("version", vec![]).await
    }

    async fn print_queue(&self) -> NeosResult<String> {
        self.call_text("printQueue", vec![]).await
    }

    async fn email_help(&self) -> NeosResult<String> {
        self.call_text("emailHelp", vec![]).await
    }

    async fn submit_job(
        &self,
        payload: &str,
        options: &SubmitOptions,
    ) -> NeosResult<(i64, String)> {
        let mut params = vec![Value::from(payload)];
        if !options.is_empty() {
            let members = options
                .fields()
                .into_iter()
                .map(|(name, value)| (name.to_string(), Value::String(value)))
                .collect();
            params.push(Value::Struct(members));
        }
        let (id, credential) = self.call("submitJob", params).await?.into_pair()?;
        Ok((id.into_int()?, credential.into_text()?))
    }

    async fn get_job_status(&self, job: JobId, credential: &JobCredential) -> NeosResult<String> {
        self.call_text("getJobStatus", job_params(job, credential)?)
            .await
    }

    async fn get_intermediate_results(
        &self,
        job: JobId,
        credential: &JobCredential,
        offset: u64,
    ) -> NeosResult<ResultChunk> {
        let mut params = job_params(job, credential)?;
        params.push(Value::Int(wire_int(offset)?));
        let (text, next) = self
            .call("getIntermediateResults", params)
            .await?
            .into_pair()?;
        let next = u64::try_from(next.into_int()?)
            .map_err(|_| NeosError::malformed("negative result offset"))?;
        Ok(ResultChunk::new(text.into_text()?, next))
    }

    async fn get_final_results(
        &self,
        job: JobId,
        credential: &JobCredential,
    ) -> NeosResult<String> {
        self.call_text("getFinalResults", job_params(job, credential)?)
            .await
    }

    async fn list_categories(&self) -> NeosResult<BTreeMap<String, String>> {
        self.call("listCategories", vec![])
            .await?
            .into_struct()?
            .into_iter()
            .map(|(code, name)| Ok::<_, NeosError>((code, name.into_string()?)))
            .collect()
    }

    async fn list_solvers_in_category(&self, category: &str) -> NeosResult<Vec<String>> {
        self.call("listSolversInCategory", vec![category.into()])
            .await?
            .into_string_list()
    }

    async fn list_all_solvers(&self) -> NeosResult<Vec<String>> {
        self.call("listAllSolvers", vec![]).await?.into_string_list()
    }

    async fn get_solver_template(
        &self,
        category: &str,
        solver: &str,
        input_format: &str,
    ) -> NeosResult<String> {
        self.call_text(
            "getSolverTemplate",
            vec![category.into(), solver.into(), input_format.into()],
        )
        .await
    }

    async fn list_methods(&self) -> NeosResult<Vec<String>> {
        self.call("system.listMethods", vec![])
            .await?
            .into_string_list()
    }

    async fn method_help(&self, method: &str) -> NeosResult<String> {
        self.call_text("system.methodHelp", vec![method.into()])
            .await
    }
}
