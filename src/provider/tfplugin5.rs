//! tfplugin5 wire types and client
//!
//! The subset of `tfplugin5.proto` needed to configure a provider and run
//! import/read: message layouts mirror the protobuf field numbers, and
//! [`ProviderClient`] issues unary calls against `tfplugin5.Provider`.

use std::collections::HashMap;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;

/// Provider schemas can run to tens of megabytes
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DynamicValue {
    #[prost(bytes = "vec", tag = "1")]
    pub msgpack: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub json: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Diagnostic {
    #[prost(enumeration = "Severity", tag = "1")]
    pub severity: i32,
    #[prost(string, tag = "2")]
    pub summary: String,
    #[prost(string, tag = "3")]
    pub detail: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Severity {
    Invalid = 0,
    Error = 1,
    Warning = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Schema {
    #[prost(int64, tag = "1")]
    pub version: i64,
    #[prost(message, optional, tag = "2")]
    pub block: Option<SchemaBlock>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SchemaBlock {
    #[prost(int64, tag = "1")]
    pub version: i64,
    #[prost(message, repeated, tag = "2")]
    pub attributes: Vec<SchemaAttribute>,
    #[prost(message, repeated, tag = "3")]
    pub block_types: Vec<SchemaNestedBlock>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SchemaAttribute {
    #[prost(string, tag = "1")]
    pub name: String,
    /// JSON-encoded cty type
    #[prost(bytes = "vec", tag = "2")]
    pub r#type: Vec<u8>,
    #[prost(string, tag = "3")]
    pub description: String,
    #[prost(bool, tag = "4")]
    pub required: bool,
    #[prost(bool, tag = "5")]
    pub optional: bool,
    #[prost(bool, tag = "6")]
    pub computed: bool,
    #[prost(bool, tag = "7")]
    pub sensitive: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SchemaNestedBlock {
    #[prost(string, tag = "1")]
    pub type_name: String,
    #[prost(message, optional, tag = "2")]
    pub block: Option<SchemaBlock>,
    #[prost(enumeration = "NestingMode", tag = "3")]
    pub nesting: i32,
    #[prost(int64, tag = "4")]
    pub min_items: i64,
    #[prost(int64, tag = "5")]
    pub max_items: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum NestingMode {
    Invalid = 0,
    Single = 1,
    List = 2,
    Set = 3,
    Map = 4,
    Group = 5,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct GetProviderSchemaRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetProviderSchemaResponse {
    #[prost(message, optional, tag = "1")]
    pub provider: Option<Schema>,
    #[prost(map = "string, message", tag = "2")]
    pub resource_schemas: HashMap<String, Schema>,
    #[prost(message, repeated, tag = "4")]
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PrepareProviderConfigRequest {
    #[prost(message, optional, tag = "1")]
    pub config: Option<DynamicValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PrepareProviderConfigResponse {
    #[prost(message, optional, tag = "1")]
    pub prepared_config: Option<DynamicValue>,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigureRequest {
    #[prost(string, tag = "1")]
    pub terraform_version: String,
    #[prost(message, optional, tag = "2")]
    pub config: Option<DynamicValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigureResponse {
    #[prost(message, repeated, tag = "1")]
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ImportResourceStateRequest {
    #[prost(string, tag = "1")]
    pub type_name: String,
    #[prost(string, tag = "2")]
    pub id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ImportedResource {
    #[prost(string, tag = "1")]
    pub type_name: String,
    #[prost(message, optional, tag = "2")]
    pub state: Option<DynamicValue>,
    #[prost(bytes = "vec", tag = "3")]
    pub private: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ImportResourceStateResponse {
    #[prost(message, repeated, tag = "1")]
    pub imported_resources: Vec<ImportedResource>,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadResourceRequest {
    #[prost(string, tag = "1")]
    pub type_name: String,
    #[prost(message, optional, tag = "2")]
    pub current_state: Option<DynamicValue>,
    #[prost(bytes = "vec", tag = "3")]
    pub private: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadResourceResponse {
    #[prost(message, optional, tag = "1")]
    pub new_state: Option<DynamicValue>,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: Vec<Diagnostic>,
    #[prost(bytes = "vec", tag = "3")]
    pub private: Vec<u8>,
}

/// Fully qualified method paths of `tfplugin5.Provider`
pub mod methods {
    pub const GET_SCHEMA: &str = "/tfplugin5.Provider/GetSchema";
    pub const PREPARE_PROVIDER_CONFIG: &str = "/tfplugin5.Provider/PrepareProviderConfig";
    pub const CONFIGURE: &str = "/tfplugin5.Provider/Configure";
    pub const IMPORT_RESOURCE_STATE: &str = "/tfplugin5.Provider/ImportResourceState";
    pub const READ_RESOURCE: &str = "/tfplugin5.Provider/ReadResource";
}

/// Unary client for `tfplugin5.Provider`.
///
/// Cloning is cheap and every call runs on its own HTTP/2 stream, so an
/// abandoned call never affects the next one.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    inner: tonic::client::Grpc<Channel>,
}

impl ProviderClient {
    pub fn new(channel: Channel) -> Self {
        let inner = tonic::client::Grpc::new(channel)
            .max_decoding_message_size(MAX_MESSAGE_SIZE)
            .max_encoding_message_size(MAX_MESSAGE_SIZE);
        Self { inner }
    }

    async fn unary<Req, Resp>(&self, method: &'static str, request: Req) -> Result<Resp, tonic::Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|e| tonic::Status::unknown(format!("Service was not ready: {}", e)))?;
        let codec = tonic::codec::ProstCodec::<Req, Resp>::default();
        let path = PathAndQuery::from_static(method);
        let response = grpc.unary(tonic::Request::new(request), path, codec).await?;
        Ok(response.into_inner())
    }

    pub async fn get_schema(&self) -> Result<GetProviderSchemaResponse, tonic::Status> {
        self.unary(methods::GET_SCHEMA, GetProviderSchemaRequest {}).await
    }

    pub async fn prepare_provider_config(
        &self,
        request: PrepareProviderConfigRequest,
    ) -> Result<PrepareProviderConfigResponse, tonic::Status> {
        self.unary(methods::PREPARE_PROVIDER_CONFIG, request).await
    }

    pub async fn configure(&self, request: ConfigureRequest) -> Result<ConfigureResponse, tonic::Status> {
        self.unary(methods::CONFIGURE, request).await
    }

    pub async fn import_resource_state(
        &self,
        request: ImportResourceStateRequest,
    ) -> Result<ImportResourceStateResponse, tonic::Status> {
        self.unary(methods::IMPORT_RESOURCE_STATE, request).await
    }

    pub async fn read_resource(&self, request: ReadResourceRequest) -> Result<ReadResourceResponse, tonic::Status> {
        self.unary(methods::READ_RESOURCE, request).await
    }
}

/// Fold error diagnostics into one message; warnings are only logged
pub fn check_diagnostics(method: &str, diagnostics: &[Diagnostic]) -> anyhow::Result<()> {
    let mut errors = Vec::new();
    for diagnostic in diagnostics {
        let text = if diagnostic.detail.is_empty() {
            diagnostic.summary.clone()
        } else {
            format!("{}: {}", diagnostic.summary, diagnostic.detail)
        };
        if diagnostic.severity == Severity::Error as i32 {
            errors.push(text);
        } else {
            tracing::warn!("{} warning: {}", method, text);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} failed: {}", method, errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostic(severity: Severity, summary: &str, detail: &str) -> Diagnostic {
        Diagnostic {
            severity: severity as i32,
            summary: summary.to_string(),
            detail: detail.to_string(),
        }
    }

    #[test]
    fn test_warnings_do_not_fail() {
        let diagnostics = vec![diagnostic(Severity::Warning, "deprecated", "")];
        assert!(check_diagnostics("Configure", &diagnostics).is_ok());
    }

    #[test]
    fn test_errors_are_joined() {
        let diagnostics = vec![
            diagnostic(Severity::Error, "Cannot import non-existent remote object", ""),
            diagnostic(Severity::Warning, "ignored", ""),
            diagnostic(Severity::Error, "bad id", "expected a resource group"),
        ];
        let err = check_diagnostics("ImportResourceState", &diagnostics).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ImportResourceState failed: Cannot import non-existent remote object; bad id: expected a resource group"
        );
    }

    #[test]
    fn test_imported_resource_wire_layout() {
        use prost::Message;
        let resource = ImportedResource {
            type_name: "azurerm_resource_group".to_string(),
            state: Some(DynamicValue {
                msgpack: vec![0xc0],
                json: Vec::new(),
            }),
            private: b"p".to_vec(),
        };
        let bytes = resource.encode_to_vec();
        // field 1 (string), field 2 (message), field 3 (bytes)
        assert_eq!(bytes[0], 0x0a);
        assert_eq!(ImportedResource::decode(bytes.as_slice()).unwrap(), resource);
    }
}
