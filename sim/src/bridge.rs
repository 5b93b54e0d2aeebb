//! Live remote-control bridge.
//!
//! The arm connects as a WebSocket client to a server that streams
//! `{"Target_position": [...]}` frames. The newest array is kept in a
//! [`RemoteTargets`] and written to the drives by a fixed-rate physics loop
//! whenever it covers every actuated joint. At a slower rate the arm sends
//! its tool position, relative to the robot base, back in the same shape.

use std::error::Error;
use std::time::Duration;

use arm_sampler::backend::ArmBody;
use arm_sampler::bridge::{RemoteAngles, RemoteTargets};
use arm_sampler::config::{ColliderPolicy, DriveGains};
use arm_sampler::drive::JointDriveModel;
use arm_sampler::driver::CancelHandle;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::arm::SimArm;
use crate::settings::BridgeSettings;

pub type BridgeStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub async fn connect(url: &str) -> Result<BridgeStream, Box<dyn Error + Send + Sync>> {
    let (stream, _) = connect_async(url).await?;
    info!("Bridge connected to {}", url);
    Ok(stream)
}

/// Store the angles carried by one frame. Malformed frames are logged and dropped.
pub fn handle_frame(text: &str, remote: &mut RemoteTargets) -> bool {
    match RemoteAngles::parse(text) {
        Ok(message) => {
            remote.update(message.target_position);
            true
        }
        Err(e) => {
            warn!("Ignoring bridge message {:?}: {}", text, e);
            false
        }
    }
}

fn tool_report(arm: &SimArm) -> RemoteAngles {
    let tool = arm.end_effector() - arm.base_origin();
    RemoteAngles {
        target_position: vec![tool.x, tool.y, tool.z],
    }
}

/// Drive `arm` from the server's angles until `cancel` is raised or the
/// server closes the connection. Returns the last received targets.
pub async fn run_session<S>(
    stream: WebSocketStream<S>,
    arm: &mut SimArm,
    gains: DriveGains,
    options: &BridgeSettings,
    cancel: CancelHandle,
) -> Result<RemoteTargets, Box<dyn Error + Send + Sync>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sender, mut receiver) = stream.split();
    let mut remote = RemoteTargets::new();
    let mut drive = JointDriveModel::discover(arm);
    drive.initialize(arm, gains, ColliderPolicy::PerJoint);

    let dt = 1.0 / options.rate_hz;
    let mut physics = tokio::time::interval(Duration::from_secs_f64(dt));
    let mut report = tokio::time::interval(Duration::from_secs_f64(options.report_interval_s));
    let mut last_update = 0;

    while !cancel.is_cancelled() {
        tokio::select! {
            _ = physics.tick() => {
                if remote.updates() != last_update && drive.apply_remote(arm, &remote) {
                    last_update = remote.updates();
                    debug!("Applied remote targets {:?}", drive.targets());
                }
                arm.step(dt);
            }
            _ = report.tick() => {
                let json = tool_report(arm).to_json()?;
                sender.send(Message::Text(json)).await?;
            }
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    handle_frame(&text, &mut remote);
                }
                Some(Ok(Message::Binary(bytes))) => {
                    handle_frame(&String::from_utf8_lossy(&bytes), &mut remote);
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Bridge server closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
        }
    }

    let _ = sender.close().await;
    let tool = arm.end_effector();
    info!("Bridge physics stopped with tool at ({:.3}, {:.3}, {:.3})", tool.x, tool.y, tool.z);
    Ok(remote)
}
