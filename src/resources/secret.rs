use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use kube::core::ObjectMeta;
use rand::Rng;

use crate::crd::SearchOperator;
use crate::resources::common::{SECRET_NAME, SECRET_PASSWORD_KEY, owner_reference, standard_labels};

/// Length of generated Redisgraph passwords
pub const PASSWORD_LENGTH: usize = 32;

/// Generate a secure random password
pub fn generate_password(len: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// Build the Redisgraph credentials Secret
///
/// The name is fixed per namespace, so the reconciler only ever creates it
/// once and never regenerates an existing password.
pub fn build_credential(operator: &SearchOperator, password: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(SECRET_NAME.to_string()),
            namespace: operator.namespace(),
            labels: Some(standard_labels()),
            owner_references: Some(vec![owner_reference(operator)]),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(BTreeMap::from([(
            SECRET_PASSWORD_KEY.to_string(),
            ByteString(password.as_bytes().to_vec()),
        )])),
        ..Default::default()
    }
}
