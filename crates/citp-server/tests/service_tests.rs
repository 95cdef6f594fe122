//! Dispatch state machine tests

mod common;

use std::sync::atomic::Ordering;

use common::*;

use citp_core::msex::{
    ClientInformationMessage, GetElementInformationMessage, GetElementLibraryInformationMessage,
    GetElementLibraryThumbnailMessage, GetElementThumbnailMessage, GetVideoSourcesMessage,
    MsexMessage, MsexMessageType, RequestStreamMessage, Selection,
};
use citp_core::pinf::{PeerNameMessage, PinfMessage};
use citp_core::types::{ImageFormat, LibraryId, LibraryType, ThumbnailFlags};
use citp_core::{CitpPacket, Error, Header, MsexVersion};
use citp_server::{Connection, ConnectionState, ServiceConfig, ServiceFlags};

fn decode_one(datagram: &[u8]) -> (Header, CitpPacket) {
    CitpPacket::decode_datagram(datagram).expect("response should decode")
}

fn expect_nack(datagram: &[u8], expected_type: MsexMessageType, expected_index: u16) {
    let (header, packet) = decode_one(datagram);
    assert_eq!(header.request_index, expected_index);
    match packet {
        CitpPacket::Msex {
            message: MsexMessage::NegativeAcknowledge(m),
            ..
        } => assert_eq!(m.received_message_type, expected_type.id()),
        other => panic!("expected NACK, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_information_activates_and_answers_server_information() {
    let (service, _) = service_with(MockDevice::default(), ServiceConfig::default());
    let mut connection = Connection::new(client_addr());
    assert_eq!(connection.state, ConnectionState::AwaitingClientInfo);

    let datagram = msex_datagram(
        MsexVersion::V1_2,
        5,
        MsexMessage::ClientInformation(ClientInformationMessage {
            supported_versions: vec![MsexVersion::V1_1, MsexVersion::V1_2],
        }),
    );
    let responses = service.handle_datagram(&mut connection, &datagram).await.unwrap();

    assert!(connection.is_active());
    assert_eq!(connection.supported_versions, vec![MsexVersion::V1_1, MsexVersion::V1_2]);
    assert_eq!(responses.len(), 1);

    let (header, packet) = decode_one(&responses[0]);
    assert_eq!(header.request_index, 5);
    match packet {
        CitpPacket::Msex {
            message: MsexMessage::ServerInformation(m),
            ..
        } => {
            assert_eq!(m.product_name, "Mock Media Server");
            assert_eq!(m.supported_library_types, vec![LibraryType::Media, LibraryType::Effects]);
        }
        other => panic!("expected server information, got {other:?}"),
    }
}

#[tokio::test]
async fn test_msex_before_client_information_is_nacked() {
    let (service, device) = service_with(MockDevice::default(), ServiceConfig::default());
    let mut connection = Connection::new(client_addr());

    let datagram = msex_datagram(
        MsexVersion::V1_2,
        9,
        MsexMessage::GetVideoSources(GetVideoSourcesMessage),
    );
    let responses = service.handle_datagram(&mut connection, &datagram).await.unwrap();
    assert_eq!(responses.len(), 1);
    expect_nack(&responses[0], MsexMessageType::GetVideoSources, 9);
    assert_eq!(connection.state, ConnectionState::AwaitingClientInfo);
    assert_eq!(device.thumbnail_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_wire_unknown_msex_type_is_nacked() {
    let (service, _) = service_with(MockDevice::default(), ServiceConfig::default());
    let mut connection = Connection::new(client_addr());
    activate(&service, &mut connection).await;

    // hand-build an MSEX body with a bogus message type
    let mut body = Vec::new();
    body.extend_from_slice(b"Zzzz");
    body.extend_from_slice(&[1, 2]); // version 1.2
    let datagram = citp_core::envelope::encode_single(
        citp_core::LayerType::MediaServerExtensions,
        77,
        &body,
    );

    let responses = service.handle_datagram(&mut connection, &datagram).await.unwrap();
    assert_eq!(responses.len(), 1);
    let (header, packet) = decode_one(&responses[0]);
    assert_eq!(header.request_index, 77);
    match packet {
        CitpPacket::Msex {
            message: MsexMessage::NegativeAcknowledge(m),
            ..
        } => assert_eq!(m.received_message_type.as_bytes(), b"Zzzz"),
        other => panic!("expected NACK, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unhandled_msex_type_is_nacked() {
    let (service, _) = service_with(MockDevice::default(), ServiceConfig::default());
    let mut connection = Connection::new(client_addr());
    activate(&service, &mut connection).await;

    // a media server never services stream frames sent *to* it
    let datagram = msex_datagram(
        MsexVersion::V1_1,
        3,
        MsexMessage::StreamFrame(citp_core::msex::StreamFrameMessage {
            server_uuid: String::new(),
            source_identifier: 1,
            format: ImageFormat::Rgb8,
            width: 8,
            height: 8,
            data: bytes::Bytes::from_static(&[0]),
        }),
    );
    let responses = service.handle_datagram(&mut connection, &datagram).await.unwrap();
    assert_eq!(responses.len(), 1);
    expect_nack(&responses[0], MsexMessageType::StreamFrame, 3);
}

#[tokio::test]
async fn test_disabled_element_thumbnails_short_circuit() {
    let config = ServiceConfig {
        flags: ServiceFlags::DISABLE_ELEMENT_THUMBNAILS,
        ..ServiceConfig::default()
    };
    let (service, device) = service_with(MockDevice::default(), config);
    let mut connection = Connection::new(client_addr());
    activate(&service, &mut connection).await;

    let datagram = msex_datagram(
        MsexVersion::V1_2,
        42,
        MsexMessage::GetElementThumbnail(GetElementThumbnailMessage {
            library_type: LibraryType::Media,
            library_id: LibraryId::ROOT.child(1).unwrap(),
            format: ImageFormat::Jpeg,
            width: 64,
            height: 48,
            flags: ThumbnailFlags::NONE,
            requested_elements: Selection::All,
        }),
    );
    let responses = service.handle_datagram(&mut connection, &datagram).await.unwrap();

    // NACK carries the original request index; the device was never asked
    assert_eq!(responses.len(), 1);
    expect_nack(&responses[0], MsexMessageType::GetElementThumbnail, 42);
    assert_eq!(device.thumbnail_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_library_thumbnail_batch_skips_missing_and_imageless() {
    let mut device = MockDevice::default();
    device.imageless.insert(4); // library 4 exists but has no artwork
    let (service, device) = service_with(device, ServiceConfig::default());
    let mut connection = Connection::new(client_addr());
    activate(&service, &mut connection).await;

    // five ids requested: 1-4 exist, 7 does not, 4 has no image
    let requested: Vec<LibraryId> = [1u8, 2, 3, 4, 7]
        .iter()
        .map(|&n| LibraryId::ROOT.child(n).unwrap())
        .collect();
    let datagram = msex_datagram(
        MsexVersion::V1_2,
        13,
        MsexMessage::GetElementLibraryThumbnail(GetElementLibraryThumbnailMessage {
            library_type: LibraryType::Media,
            format: ImageFormat::Jpeg,
            width: 128,
            height: 96,
            flags: ThumbnailFlags::PRESERVE_ASPECT_RATIO,
            requested_libraries: Selection::These(requested),
        }),
    );
    let responses = service.handle_datagram(&mut connection, &datagram).await.unwrap();

    assert_eq!(responses.len(), 3, "one packet per resolved thumbnail");
    for response in &responses {
        let (header, packet) = decode_one(response);
        assert_eq!(header.request_index, 13);
        assert!(matches!(
            packet,
            CitpPacket::Msex {
                message: MsexMessage::ElementLibraryThumbnail(_),
                ..
            }
        ));
    }
    // the absent library never reached the device; the imageless one did
    assert_eq!(device.thumbnail_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_element_thumbnail_type_mismatch_yields_nothing() {
    let (service, device) = service_with(MockDevice::default(), ServiceConfig::default());
    let mut connection = Connection::new(client_addr());
    activate(&service, &mut connection).await;

    // library 9 is an effects library, requested as media
    let datagram = msex_datagram(
        MsexVersion::V1_2,
        8,
        MsexMessage::GetElementThumbnail(GetElementThumbnailMessage {
            library_type: LibraryType::Media,
            library_id: LibraryId::ROOT.child(9).unwrap(),
            format: ImageFormat::Jpeg,
            width: 64,
            height: 48,
            flags: ThumbnailFlags::NONE,
            requested_elements: Selection::All,
        }),
    );
    let responses = service.handle_datagram(&mut connection, &datagram).await.unwrap();
    assert!(responses.is_empty());
    assert_eq!(device.thumbnail_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_get_library_information_all_filters_by_presence() {
    let (service, _) = service_with(MockDevice::default(), ServiceConfig::default());
    let mut connection = Connection::new(client_addr());
    activate(&service, &mut connection).await;

    let datagram = msex_datagram(
        MsexVersion::V1_2,
        2,
        MsexMessage::GetElementLibraryInformation(GetElementLibraryInformationMessage {
            library_type: LibraryType::Media,
            parent_id: None,
            requested_libraries: Selection::All,
        }),
    );
    let responses = service.handle_datagram(&mut connection, &datagram).await.unwrap();
    assert_eq!(responses.len(), 1);

    match decode_one(&responses[0]).1 {
        CitpPacket::Msex {
            message: MsexMessage::ElementLibraryInformation(m),
            ..
        } => {
            // media libraries 1-4; the effects library is filtered out
            assert_eq!(m.libraries.len(), 4);
            assert!(m
                .libraries
                .iter()
                .all(|library| library.id.library_number().unwrap() <= 4));
        }
        other => panic!("expected library information, got {other:?}"),
    }
}

#[tokio::test]
async fn test_get_library_information_under_leaf_parent_is_empty_listing() {
    let (service, _) = service_with(MockDevice::default(), ServiceConfig::default());
    let mut connection = Connection::new(client_addr());
    activate(&service, &mut connection).await;

    // a level-3 parent cannot have children at any version
    let leaf = LibraryId::ROOT
        .child(1)
        .unwrap()
        .child(1)
        .unwrap()
        .child(1)
        .unwrap();
    let datagram = msex_datagram(
        MsexVersion::V1_2,
        2,
        MsexMessage::GetElementLibraryInformation(GetElementLibraryInformationMessage {
            library_type: LibraryType::Media,
            parent_id: Some(leaf),
            requested_libraries: Selection::All,
        }),
    );
    let responses = service.handle_datagram(&mut connection, &datagram).await.unwrap();
    assert_eq!(responses.len(), 1);
    match decode_one(&responses[0]).1 {
        CitpPacket::Msex {
            message: MsexMessage::ElementLibraryInformation(m),
            ..
        } => assert!(m.libraries.is_empty()),
        other => panic!("expected empty library information, got {other:?}"),
    }
}

#[tokio::test]
async fn test_get_element_information_unknown_library_yields_nothing() {
    let (service, _) = service_with(MockDevice::default(), ServiceConfig::default());
    let mut connection = Connection::new(client_addr());
    activate(&service, &mut connection).await;

    let datagram = msex_datagram(
        MsexVersion::V1_2,
        6,
        MsexMessage::GetElementInformation(GetElementInformationMessage {
            library_type: LibraryType::Media,
            library_id: LibraryId::ROOT.child(200).unwrap(),
            requested_elements: Selection::All,
        }),
    );
    let responses = service.handle_datagram(&mut connection, &datagram).await.unwrap();
    assert!(responses.is_empty());
}

#[tokio::test]
async fn test_get_element_information_media_listing() {
    let (service, _) = service_with(MockDevice::default(), ServiceConfig::default());
    let mut connection = Connection::new(client_addr());
    activate(&service, &mut connection).await;

    let datagram = msex_datagram(
        MsexVersion::V1_1,
        4,
        MsexMessage::GetElementInformation(GetElementInformationMessage {
            library_type: LibraryType::Media,
            library_id: LibraryId::ROOT.child(3).unwrap(),
            requested_elements: Selection::These(vec![4, 5, 6, 250]),
        }),
    );
    let responses = service.handle_datagram(&mut connection, &datagram).await.unwrap();
    assert_eq!(responses.len(), 1);
    match decode_one(&responses[0]).1 {
        CitpPacket::Msex {
            message: MsexMessage::MediaElementInformation(m),
            ..
        } => {
            // only 4 and 5 exist; absent numbers are silently skipped
            let numbers: Vec<u8> = m.elements.iter().map(|e| e.number).collect();
            assert_eq!(numbers, vec![4, 5]);
        }
        other => panic!("expected media element information, got {other:?}"),
    }
}

#[tokio::test]
async fn test_video_sources_listing_and_streaming_flag() {
    let (service, _) = service_with(MockDevice::default(), ServiceConfig::default());
    let mut connection = Connection::new(client_addr());
    activate(&service, &mut connection).await;

    let datagram = msex_datagram(
        MsexVersion::V1_0,
        1,
        MsexMessage::GetVideoSources(GetVideoSourcesMessage),
    );
    let responses = service.handle_datagram(&mut connection, &datagram).await.unwrap();
    match decode_one(&responses[0]).1 {
        CitpPacket::Msex {
            message: MsexMessage::VideoSources(m),
            ..
        } => assert_eq!(m.sources.len(), 1),
        other => panic!("expected video sources, got {other:?}"),
    }

    let config = ServiceConfig {
        flags: ServiceFlags::DISABLE_STREAMING,
        ..ServiceConfig::default()
    };
    let (disabled, _) = service_with(MockDevice::default(), config);
    let mut connection = Connection::new(client_addr());
    activate(&disabled, &mut connection).await;

    let datagram = msex_datagram(
        MsexVersion::V1_0,
        1,
        MsexMessage::GetVideoSources(GetVideoSourcesMessage),
    );
    let responses = disabled.handle_datagram(&mut connection, &datagram).await.unwrap();
    expect_nack(&responses[0], MsexMessageType::GetVideoSources, 1);
}

#[tokio::test]
async fn test_request_stream_requires_announced_peer() {
    let (service, _) = service_with(MockDevice::default(), ServiceConfig::default());
    let mut connection = Connection::new(client_addr());
    activate(&service, &mut connection).await;

    let request = MsexMessage::RequestStream(RequestStreamMessage {
        source_identifier: 1,
        format: ImageFormat::Rgb8,
        width: 320,
        height: 180,
        fps: 30,
        timeout_secs: 5,
    });

    // no peer name announced yet: logged and dropped
    let datagram = msex_datagram(MsexVersion::V1_2, 1, request.clone());
    let responses = service.handle_datagram(&mut connection, &datagram).await.unwrap();
    assert!(responses.is_empty());
    assert_eq!(service.streams().live_requests(), 0);

    // announce a peer name, then the request registers
    let name = CitpPacket::Pinf(PinfMessage::PeerName(PeerNameMessage {
        name: "Desk A".into(),
    }));
    let name_datagram = name.to_datagrams(0, None).unwrap()[0].to_vec();
    service.handle_datagram(&mut connection, &name_datagram).await.unwrap();
    assert!(connection.peer.is_some());
    assert_eq!(service.peers().len(), 1);

    let datagram = msex_datagram(MsexVersion::V1_2, 2, request);
    service.handle_datagram(&mut connection, &datagram).await.unwrap();
    assert_eq!(service.streams().live_requests(), 1);
}

#[tokio::test]
async fn test_malformed_header_is_connection_fatal() {
    let (service, _) = service_with(MockDevice::default(), ServiceConfig::default());
    let mut connection = Connection::new(client_addr());

    let mut datagram = msex_datagram(
        MsexVersion::V1_2,
        1,
        MsexMessage::GetVideoSources(GetVideoSourcesMessage),
    );
    datagram[0] = b'X';
    let err = service.handle_datagram(&mut connection, &datagram).await.unwrap_err();
    assert!(matches!(
        err,
        citp_server::ServiceError::Protocol(Error::InvalidCookie(_))
    ));
}

#[tokio::test]
async fn test_fragmented_request_is_reassembled_before_dispatch() {
    let (service, _) = service_with(MockDevice::default(), ServiceConfig::default());
    let mut connection = Connection::new(client_addr());
    activate(&service, &mut connection).await;

    let packet = CitpPacket::Msex {
        version: MsexVersion::V1_2,
        message: MsexMessage::GetElementLibraryInformation(GetElementLibraryInformationMessage {
            library_type: LibraryType::Media,
            parent_id: None,
            requested_libraries: Selection::These((0..100).collect()),
        }),
    };
    // force several tiny parts
    let parts = packet.to_datagrams(30, Some(40)).unwrap();
    assert!(parts.len() > 1);

    let mut responses = Vec::new();
    for part in &parts {
        responses = service.handle_datagram(&mut connection, part).await.unwrap();
    }
    assert_eq!(responses.len(), 1);
    assert!(matches!(
        decode_one(&responses[0]).1,
        CitpPacket::Msex {
            message: MsexMessage::ElementLibraryInformation(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_connection_opened_announces_peer_name() {
    let (service, _) = service_with(MockDevice::default(), ServiceConfig::default());
    let connection = Connection::new(client_addr());
    let datagrams = service.connection_opened(&connection).unwrap();
    assert_eq!(datagrams.len(), 1);
    match decode_one(&datagrams[0]).1 {
        CitpPacket::Pinf(PinfMessage::PeerName(m)) => assert_eq!(m.name, "Test Server"),
        other => panic!("expected peer name announcement, got {other:?}"),
    }
}
