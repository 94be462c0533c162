use crate::{ModelError, TunnelField, TunnelKind, TunnelProperties, TunnelUpdate};

use std::path::PathBuf;

/// **VALUE**: Creating a directory tunnel with a proxy port must be refused locally.
///
/// **WHY THIS MATTERS**: Kind-specific fields are mutually exclusive. If a foreign
/// field reached the companion, the resulting tunnel would carry settings that can
/// never take effect.
///
/// **BUG THIS CATCHES**: Would catch if `ProxyPort` is reclassified as a common field
/// or if `validate_for` stops walking every set field.
#[test]
fn given_directory_kind_when_properties_contain_proxy_port_then_invalid_property() {
    // GIVEN: Properties mixing a common field with a proxy-only field
    let properties = TunnelProperties::default()
        .with_name("docs")
        .with_proxy_port(9000);

    // WHEN: Validating for a directory tunnel
    let result = properties.validate_for(TunnelKind::Directory);

    // THEN: The proxy field is reported
    match result {
        Err(ModelError::InvalidProperty { field, kind, .. }) => {
            assert_eq!(field, TunnelField::ProxyPort);
            assert_eq!(kind, TunnelKind::Directory);
        }
        other => panic!("Expected InvalidProperty, got {other:?}"),
    }
}

#[test]
fn given_proxy_kind_when_properties_contain_index_file_then_invalid_property() {
    let properties = TunnelProperties::default().with_index_file("index.html");

    let result = properties.validate_for(TunnelKind::Proxy);

    assert!(matches!(
        result,
        Err(ModelError::InvalidProperty {
            field: TunnelField::DirectoryIndexFile,
            ..
        })
    ));
}

#[test]
fn given_common_fields_when_validated_for_either_kind_then_ok() {
    let properties = TunnelProperties::default()
        .with_name("shared")
        .with_enabled(true)
        .with_temporary(true);

    assert!(properties.validate_for(TunnelKind::Proxy).is_ok());
    assert!(properties.validate_for(TunnelKind::Directory).is_ok());
}

#[test]
fn given_properties_when_listing_fields_then_only_set_fields_in_order() {
    let properties = TunnelProperties::default()
        .with_live_reload_enabled(true)
        .with_name("a");

    assert_eq!(
        properties.fields(),
        vec![TunnelField::Name, TunnelField::IsLiveReloadEnabled]
    );
}

#[test]
fn given_update_for_wrong_kind_when_validated_then_invalid_property() {
    let update = TunnelUpdate::Directory(PathBuf::from("/srv/www"));

    assert!(matches!(
        update.validate_for(TunnelKind::Proxy),
        Err(ModelError::InvalidProperty { .. })
    ));
    assert!(update.validate_for(TunnelKind::Directory).is_ok());
}

#[test]
fn given_zero_proxy_port_update_when_validated_then_validation_error() {
    let result = TunnelUpdate::ProxyPort(0).validate_for(TunnelKind::Proxy);

    assert!(matches!(result, Err(ModelError::Validation { .. })));
}

#[test]
fn given_every_field_when_key_requested_then_keys_are_unique() {
    let fields = [
        TunnelField::Name,
        TunnelField::IsEnabled,
        TunnelField::IsTemporary,
        TunnelField::ProxyPort,
        TunnelField::ShouldRewriteHostHeader,
        TunnelField::ProxyHostHeader,
        TunnelField::Directory,
        TunnelField::DirectoryIndexFile,
        TunnelField::IsBrowsingEnabled,
        TunnelField::IsLiveReloadEnabled,
    ];

    let mut keys: Vec<_> = fields.iter().map(TunnelField::key).collect();
    keys.sort();
    keys.dedup();

    assert_eq!(keys.len(), fields.len());
}
