/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Loopback Correlation Example
//!
//! This example runs an engine against an in-process counterparty:
//! - The transport stamps sequence numbers and forwards every order to the counterparty
//! - The counterparty answers each order with a New and a Fill execution report
//! - Each request's replies arrive on its own subscription
//! - A Logout fails every pending request; a new logon resumes correlation

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use ironlink::prelude::*;

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Transport that hands every sent message to the in-process counterparty.
struct LoopbackTransport {
    next_seq: AtomicU64,
    outbound: mpsc::UnboundedSender<(ConnectionId, Message)>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn transmit(
        &self,
        connection: &ConnectionId,
        mut message: Message,
    ) -> std::result::Result<Message, TransportError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        message.set_field(tags::MSG_SEQ_NUM, seq.to_string());
        self.outbound
            .send((connection.clone(), message.clone()))
            .map_err(|_| TransportError::Closed)?;
        Ok(message)
    }
}

/// Answers every order with a New and a Fill.
async fn counterparty(
    engine: Arc<Engine>,
    mut inbox: mpsc::UnboundedReceiver<(ConnectionId, Message)>,
) {
    while let Some((connection, order)) = inbox.recv().await {
        let Some(cl_ord_id) = order.get_field_str(tags::CL_ORD_ID) else {
            continue;
        };
        for status in ["0", "2"] {
            let report = Message::new(MsgType::ExecutionReport)
                .with_field(tags::CL_ORD_ID, cl_ord_id)
                .with_field(39, status);
            if let Err(reason) = engine.from_app(&report, &connection).await {
                warn!(?reason, "counterparty reply rejected");
            }
        }
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .try_init();
}

async fn logon(engine: &Engine, connection: &ConnectionId) -> anyhow::Result<()> {
    engine.on_create(connection).await;
    let mut logon = Message::new(MsgType::Logon);
    engine
        .to_admin(&mut logon, connection)
        .await
        .map_err(|reason| anyhow::anyhow!("logon suppressed: {}", reason.text))?;
    info!(
        username = logon.get_field_str(tags::USERNAME).unwrap_or("-"),
        "logon prepared"
    );
    engine.on_logon(connection).await;
    Ok(())
}

fn order(cl_ord_id: &str) -> Message {
    Message::new(MsgType::NewOrderSingle)
        .with_field(tags::CL_ORD_ID, cl_ord_id)
        .with_field(55, "EUR/USD")
        .with_field(54, "1")
        .with_field(38, "1000000")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let broker = ConnectionConfigBuilder::new()
        .name("broker")
        .sender_comp_id("CLIENT")
        .target_comp_id("BROKER")
        .role(ConnectionRole::DialingMultiThreaded)
        .credentials("trader", "s3cret")
        .build()?;
    let broker_id = broker.connection_id.clone();

    let (outbound, inbox) = mpsc::unbounded_channel();
    let engine = Arc::new(
        EngineBuilder::new()
            .with_transport(LoopbackTransport {
                next_seq: AtomicU64::new(0),
                outbound,
            })
            .add_connection(broker)
            .with_startup_timeout(Duration::from_secs(2))
            .build()?,
    );
    tokio::spawn(counterparty(Arc::clone(&engine), inbox));

    logon(&engine, &broker_id).await?;
    engine
        .await_startup_async(engine.config().startup_timeout)
        .await?;
    info!("startup complete");

    let mut first = engine.send_and_correlate(&broker_id, order("REQ-1")).await?;
    let mut second = engine.send_and_correlate(&broker_id, order("REQ-2")).await?;

    for (name, subscription) in [("REQ-1", &mut first), ("REQ-2", &mut second)] {
        for _ in 0..2 {
            let report = subscription.recv_timeout(REPLY_TIMEOUT).await?;
            info!(
                request = name,
                cl_ord_id = report.get_field_str(tags::CL_ORD_ID).unwrap_or("-"),
                ord_status = report.get_field_str(39).unwrap_or("-"),
                "correlated reply"
            );
        }
    }

    let mut pending = engine.subscribe(&broker_id, match_cl_ord_id("NEVER"))?;
    let logout = Message::new(MsgType::Logout).with_field(tags::TEXT, "end of day");
    engine
        .from_admin(&logout, &broker_id)
        .await
        .map_err(|reason| anyhow::anyhow!("logout rejected: {}", reason.text))?;

    match pending.recv().await {
        Err(RecvError::Dropped(dropped)) => info!(%dropped, "pending request failed"),
        other => warn!(?other, "unexpected result"),
    }
    if let Err(err) = engine.send(&broker_id, order("REQ-3")).await {
        info!(%err, "send refused while dropped");
    }

    logon(&engine, &broker_id).await?;
    let mut resumed = engine.send_and_correlate(&broker_id, order("REQ-4")).await?;
    let report = resumed.recv_timeout(REPLY_TIMEOUT).await?;
    info!(
        cl_ord_id = report.get_field_str(tags::CL_ORD_ID).unwrap_or("-"),
        "correlation resumed after reconnect"
    );

    engine.close();
    Ok(())
}
