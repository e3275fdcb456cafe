use crate::error::{Result, SsmTailError};
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::Filter;
use aws_sdk_ec2::Client;

/// A running EC2 instance and its Name tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningInstance {
    pub name: String,
    pub id: String,
}

pub struct Ec2Selector {
    client: Client,
}

impl Ec2Selector {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }

    /// Running instances sorted by name, then id
    pub async fn running_instances(&self) -> Result<Vec<RunningInstance>> {
        let output = self
            .client
            .describe_instances()
            .filters(
                Filter::builder()
                    .name("instance-state-name")
                    .values("running")
                    .build(),
            )
            .send()
            .await
            .map_err(|e| SsmTailError::Aws(DisplayErrorContext(&e).to_string()))?;

        let mut instances: Vec<RunningInstance> = output
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .filter_map(|instance| {
                let id = instance.instance_id()?.to_string();
                let name = instance
                    .tags()
                    .iter()
                    .find(|tag| tag.key() == Some("Name"))
                    .and_then(|tag| tag.value())
                    .unwrap_or_default()
                    .to_string();
                Some(RunningInstance { name, id })
            })
            .collect();

        instances.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(instances)
    }
}
