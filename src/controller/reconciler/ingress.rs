//! # Ingress Construction
//!
//! Builds the Ingress owned by an annotated Service:
//!
//! ```yaml
//! apiVersion: networking.k8s.io/v1
//! kind: Ingress
//! metadata:
//!   name: <service name>
//!   namespace: <service namespace>
//!   ownerReferences:
//!     - apiVersion: v1
//!       kind: Service
//!       name: <service name>
//!       controller: true
//!       blockOwnerDeletion: true
//! spec:
//!   ingressClassName: nginx
//!   rules:
//!     - host: ingressx.com
//!       http:
//!         paths:
//!           - path: /
//!             pathType: Prefix
//!             backend:
//!               service:
//!                 name: <service name>
//!                 port:
//!                   number: 80
//! ```

use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};

use crate::config::ControllerConfig;
use crate::constants::{
    DEFAULT_INGRESS_BACKEND_PORT, DEFAULT_INGRESS_CLASS_NAME, DEFAULT_INGRESS_HOST,
    DEFAULT_INGRESS_PATH, DEFAULT_INGRESS_PATH_TYPE,
};
use crate::controller::key::ObjectKey;
use crate::controller::reconciler::types::ReconcilerError;

/// Fixed shape of every generated Ingress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressTemplate {
    pub class_name: String,
    /// Same host for every Service
    pub host: String,
    pub path: String,
    pub path_type: String,
    pub backend_port: i32,
}

impl Default for IngressTemplate {
    fn default() -> Self {
        Self {
            class_name: DEFAULT_INGRESS_CLASS_NAME.to_string(),
            host: DEFAULT_INGRESS_HOST.to_string(),
            path: DEFAULT_INGRESS_PATH.to_string(),
            path_type: DEFAULT_INGRESS_PATH_TYPE.to_string(),
            backend_port: DEFAULT_INGRESS_BACKEND_PORT,
        }
    }
}

impl IngressTemplate {
    #[must_use]
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            class_name: config.ingress_class_name.clone(),
            host: config.ingress_host.clone(),
            backend_port: config.ingress_backend_port,
            ..Self::default()
        }
    }

    /// Build the Ingress for `service`, owned by it
    ///
    /// # Errors
    ///
    /// [`ReconcilerError::OwnerReference`] when the Service has no uid yet.
    pub fn build(&self, service: &Service) -> Result<Ingress, ReconcilerError> {
        let name = service.name_any();
        let namespace = service.namespace();
        let mut owner = service
            .controller_owner_ref(&())
            .ok_or_else(|| ReconcilerError::OwnerReference {
                key: ObjectKey::new(namespace.clone().unwrap_or_default(), name.clone()),
            })?;
        // Foreground deletion of the Service waits for the Ingress
        owner.block_owner_deletion = Some(true);

        Ok(Ingress {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace,
                owner_references: Some(vec![owner]),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                ingress_class_name: Some(self.class_name.clone()),
                rules: Some(vec![IngressRule {
                    host: Some(self.host.clone()),
                    http: Some(HTTPIngressRuleValue {
                        paths: vec![HTTPIngressPath {
                            path: Some(self.path.clone()),
                            path_type: self.path_type.clone(),
                            backend: IngressBackend {
                                service: Some(IngressServiceBackend {
                                    name,
                                    port: Some(ServiceBackendPort {
                                        number: Some(self.backend_port),
                                        ..Default::default()
                                    }),
                                }),
                                ..Default::default()
                            },
                        }],
                    }),
                }]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(uid: Option<&str>) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("ns1".to_string()),
                uid: uid.map(str::to_string),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_build_matches_service() {
        let ingress = IngressTemplate::default()
            .build(&service(Some("uid-web")))
            .expect("ingress");

        assert_eq!(ingress.metadata.name.as_deref(), Some("web"));
        assert_eq!(ingress.metadata.namespace.as_deref(), Some("ns1"));

        let spec = ingress.spec.expect("spec");
        assert_eq!(spec.ingress_class_name.as_deref(), Some("nginx"));
        let rules = spec.rules.expect("rules");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].host.as_deref(), Some("ingressx.com"));

        let path = &rules[0].http.as_ref().expect("http").paths[0];
        assert_eq!(path.path.as_deref(), Some("/"));
        assert_eq!(path.path_type, "Prefix");
        let backend = path.backend.service.as_ref().expect("backend");
        assert_eq!(backend.name, "web");
        assert_eq!(backend.port.as_ref().and_then(|p| p.number), Some(80));
    }

    #[test]
    fn test_build_sets_controller_owner_reference() {
        let ingress = IngressTemplate::default()
            .build(&service(Some("uid-web")))
            .expect("ingress");

        let owners = ingress.metadata.owner_references.expect("owner references");
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].api_version, "v1");
        assert_eq!(owners[0].kind, "Service");
        assert_eq!(owners[0].name, "web");
        assert_eq!(owners[0].uid, "uid-web");
        assert_eq!(owners[0].controller, Some(true));
        assert_eq!(owners[0].block_owner_deletion, Some(true));
    }

    #[test]
    fn test_build_is_deterministic() {
        let template = IngressTemplate::default();
        let svc = service(Some("uid-web"));
        assert_eq!(
            template.build(&svc).expect("first"),
            template.build(&svc).expect("second")
        );
    }

    #[test]
    fn test_build_without_uid_fails() {
        let err = IngressTemplate::default()
            .build(&service(None))
            .expect_err("no uid");
        assert!(matches!(err, ReconcilerError::OwnerReference { .. }));
    }

    #[test]
    fn test_from_config_overrides() {
        let config = ControllerConfig {
            ingress_class_name: "traefik".to_string(),
            ingress_host: "example.test".to_string(),
            ingress_backend_port: 8080,
            ..ControllerConfig::default()
        };
        let template = IngressTemplate::from_config(&config);
        assert_eq!(template.class_name, "traefik");
        assert_eq!(template.host, "example.test");
        assert_eq!(template.backend_port, 8080);
        assert_eq!(template.path, "/");
    }
}
