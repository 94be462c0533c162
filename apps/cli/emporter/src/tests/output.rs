// Unit tests for text and JSON rendering

use crate::output::{EventView, TunnelView};

use emporter_core::EmporterEvent;
use models::{ServiceState, TunnelBuilder, TunnelId, TunnelSource, TunnelState};

use std::path::PathBuf;

fn proxy_tunnel() -> models::Tunnel {
    TunnelBuilder::default()
        .with_id("t-1")
        .with_name("api")
        .with_enabled(false)
        .with_state(TunnelState::Connected)
        .with_remote_url(Some("https://api.emporter.eu".to_string()))
        .with_source(TunnelSource::Proxy {
            port: 8080,
            should_rewrite_host_header: false,
            proxy_host_header: None,
        })
        .build()
        .unwrap()
}

#[test]
fn given_proxy_tunnel_when_rendered_then_line_shows_port_and_url() {
    let view = TunnelView::from(&proxy_tunnel());

    assert_eq!(
        view.line(),
        "t-1\tproxy\tconnected\tlocalhost:8080\thttps://api.emporter.eu\t(disabled)"
    );
}

#[test]
fn given_directory_tunnel_when_serialized_then_port_omitted() {
    let tunnel = TunnelBuilder::default()
        .with_id("t-2")
        .with_name("site")
        .with_enabled(true)
        .with_state(TunnelState::Disconnected)
        .with_source(TunnelSource::Directory {
            directory: PathBuf::from("/srv/site"),
            index_file: None,
            is_browsing_enabled: false,
            is_live_reload_enabled: true,
        })
        .build()
        .unwrap();

    let json = serde_json::to_value(TunnelView::from(&tunnel)).unwrap();

    assert_eq!(json["kind"], "directory");
    assert_eq!(json["directory"], "/srv/site");
    assert!(json.get("port").is_none());
    assert!(json.get("remote_url").is_none());
}

#[test]
fn given_events_when_rendered_then_lines_name_subject() {
    let removed = EventView::from(&EmporterEvent::TunnelRemoved {
        id: TunnelId::new("t-3"),
    });
    let terminated = EventView::from(&EmporterEvent::ProcessTerminated { pid: Some(812) });
    let service = EventView::from(&EmporterEvent::ServiceStateChanged {
        state: Some(ServiceState::Connected),
    });

    assert_eq!(removed.line(), "tunnel-removed t-3");
    assert_eq!(terminated.line(), "process-terminated pid 812");
    assert_eq!(service.line(), "service-state-changed connected");
}
