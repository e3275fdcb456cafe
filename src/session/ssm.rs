use crate::config::Config;
use crate::error::{Result, SsmTailError};
use crate::session::{SessionBroker, SessionHandle};
use async_trait::async_trait;
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Session broker backed by AWS Systems Manager Session Manager
pub struct SsmBroker {
    client: Client,
    region: String,
    profile: String,
    plugin: String,
    /// SSM document for the tunnel; `None` opens a plain shell session
    document: Option<String>,
    port: u16,
}

impl SsmBroker {
    /// Broker that opens SSH tunnel sessions
    pub fn new(sdk_config: &aws_config::SdkConfig, config: &Config) -> Self {
        Self {
            client: Client::new(sdk_config),
            region: config.region.clone(),
            profile: config.profile_name().to_string(),
            plugin: config.session.plugin.clone(),
            document: Some(config.session.document.clone()),
            port: config.ssh.port,
        }
    }

    /// Switch to plain interactive shell sessions
    pub fn interactive(mut self) -> Self {
        self.document = None;
        self
    }

    fn endpoint(&self) -> String {
        format!("https://ssm.{}.amazonaws.com", self.region)
    }
}

#[async_trait]
impl SessionBroker for SsmBroker {
    async fn open(&self, target_id: &str) -> Result<SessionHandle> {
        debug!("Starting SSM session for {}", target_id);

        let mut request = self.client.start_session().target(target_id);
        if let Some(ref document) = self.document {
            request = request
                .document_name(document)
                .parameters("portNumber", vec![self.port.to_string()]);
        }

        let output = request
            .send()
            .await
            .map_err(|e| SsmTailError::SessionOpen {
                target: target_id.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        let session_id = output
            .session_id()
            .ok_or_else(|| SsmTailError::SessionOpen {
                target: target_id.to_string(),
                reason: "response carried no session id".to_string(),
            })?
            .to_string();

        let response = start_session_response(
            &session_id,
            output.token_value().unwrap_or_default(),
            output.stream_url().unwrap_or_default(),
        );
        let request = start_session_request(target_id, self.document.as_deref(), self.port);

        info!("Opened session {} for {}", session_id, target_id);

        Ok(SessionHandle::new(
            session_id,
            self.plugin.clone(),
            plugin_args(&response, &self.region, &self.profile, &request, &self.endpoint()),
        ))
    }

    async fn close(&self, session_id: &str) -> Result<()> {
        self.client
            .terminate_session()
            .session_id(session_id)
            .send()
            .await
            .map_err(|e| SsmTailError::SessionClose {
                session: session_id.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        info!("Terminated session {}", session_id);
        Ok(())
    }
}

/// StartSession request as the session manager plugin expects it
fn start_session_request(target_id: &str, document: Option<&str>, port: u16) -> Value {
    match document {
        Some(document) => json!({
            "Target": target_id,
            "DocumentName": document,
            "Parameters": { "portNumber": [port.to_string()] },
        }),
        None => json!({ "Target": target_id }),
    }
}

fn start_session_response(session_id: &str, token: &str, stream_url: &str) -> Value {
    json!({
        "SessionId": session_id,
        "TokenValue": token,
        "StreamUrl": stream_url,
    })
}

/// Positional arguments of `session-manager-plugin`
fn plugin_args(
    response: &Value,
    region: &str,
    profile: &str,
    request: &Value,
    endpoint: &str,
) -> Vec<String> {
    vec![
        response.to_string(),
        region.to_string(),
        "StartSession".to_string(),
        profile.to_string(),
        request.to_string(),
        endpoint.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tunnel_request_carries_document_and_port() {
        let request = start_session_request("i-0abc", Some("AWS-StartSSHSession"), 22);

        assert_eq!(request["Target"], "i-0abc");
        assert_eq!(request["DocumentName"], "AWS-StartSSHSession");
        assert_eq!(request["Parameters"]["portNumber"][0], "22");
    }

    #[test]
    fn test_shell_request_has_target_only() {
        let request = start_session_request("i-0abc", None, 22);

        assert_eq!(request, json!({ "Target": "i-0abc" }));
    }

    #[test]
    fn test_plugin_args_order() {
        let response = start_session_response("sess-1", "tok", "wss://stream");
        let request = start_session_request("i-0abc", None, 22);
        let args = plugin_args(
            &response,
            "ap-northeast-2",
            "default",
            &request,
            "https://ssm.ap-northeast-2.amazonaws.com",
        );

        assert_eq!(args.len(), 6);
        assert_eq!(args[1], "ap-northeast-2");
        assert_eq!(args[2], "StartSession");
        assert_eq!(args[3], "default");
        assert_eq!(args[5], "https://ssm.ap-northeast-2.amazonaws.com");

        let parsed: Value = serde_json::from_str(&args[0]).unwrap();
        assert_eq!(parsed["SessionId"], "sess-1");
        assert_eq!(parsed["StreamUrl"], "wss://stream");
    }
}
