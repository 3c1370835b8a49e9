use anyhow::Result;

use repush_engine::resolve::check_local_resources;
use repush_engine::result::CheckItem;
use repush_kafka::{KafkaPublisher, ProducerConfig};

use super::ForwarderArgs;

/// Execute the `check` command: validate config, then check the local
/// files and the broker without forwarding anything.
pub async fn execute(args: &ForwarderArgs) -> Result<()> {
    let config = args.load_validated(None)?;
    println!("Forwarder config:  OK");

    let mut report = check_local_resources(&config);

    let item = match KafkaPublisher::new(ProducerConfig::from_broker_config(&config.broker)) {
        Ok(mut publisher) => {
            let item = match publisher.probe().await {
                Ok(probe) => CheckItem::ok(
                    "Broker",
                    format!(
                        "topic '{}' via {}: {} partition(s), {} with a leader, {} broker(s)",
                        config.broker.topic,
                        probe.bootstrap,
                        probe.partitions,
                        probe.partitions_with_leader,
                        probe.brokers
                    ),
                ),
                Err(e) => CheckItem::failed("Broker", e.to_string()),
            };
            repush_engine::Publisher::close(&mut publisher).await.ok();
            item
        }
        Err(e) => CheckItem::failed("Broker", e.to_string()),
    };
    report.push(item);

    for item in &report.items {
        print_item(item);
    }

    if report.is_ok() {
        println!("\nAll checks passed.");
        Ok(())
    } else {
        anyhow::bail!("One or more checks failed")
    }
}

fn print_item(item: &CheckItem) {
    let status = if item.ok { "OK" } else { "FAILED" };
    println!("{:18} {}", format!("{}:", item.name), status);
    if !item.detail.is_empty() {
        println!("  {}", item.detail);
    }
}
