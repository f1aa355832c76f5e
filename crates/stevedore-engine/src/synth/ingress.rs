//! Ingress synthesis: the release's network entry point
//!
//! For each declared hostname we emit one TLS entry pointing at the
//! `<hostname>-tls` certificate secret and one routing rule binding the
//! hostname to the release's service on the declared port. The certificate
//! issuer annotation and the forced-TLS-redirect annotation are always
//! attached.

use stevedore_common::config::ValidatedRelease;
use stevedore_common::{Error, Result};

use crate::k8s::{
    HttpIngressPath, HttpIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTls, ServiceBackendPort,
};

use super::object_meta;

/// Annotation naming the certificate issuer for TLS secrets
pub const CLUSTER_ISSUER_ANNOTATION: &str = "cert-manager.io/cluster-issuer";

/// Annotation forcing HTTP traffic onto TLS
pub const FORCE_SSL_REDIRECT_ANNOTATION: &str = "nginx.ingress.kubernetes.io/force-ssl-redirect";

/// Certificate secret name for one hostname
pub fn tls_secret_name(hostname: &str) -> String {
    format!("{hostname}-tls")
}

/// Synthesize the Ingress for a release's ingress section
pub fn synthesize_ingress(release: &ValidatedRelease) -> Result<Ingress> {
    let config = release.config();
    let ingress = config
        .workload
        .as_ref()
        .and_then(|w| w.ingress.as_ref())
        .ok_or_else(|| Error::internal("synthesizer", "no ingress section declared"))?;

    let mut meta = object_meta(config, &config.name, &ingress.labels, &ingress.annotations)?;
    meta.annotations.insert(
        CLUSTER_ISSUER_ANNOTATION.to_string(),
        ingress.cluster_issuer.clone(),
    );
    meta.annotations.insert(
        FORCE_SSL_REDIRECT_ANNOTATION.to_string(),
        "true".to_string(),
    );

    let tls = ingress
        .hostnames
        .iter()
        .map(|host| IngressTls {
            hosts: vec![host.clone()],
            secret_name: tls_secret_name(host),
        })
        .collect();

    let rules = ingress
        .hostnames
        .iter()
        .map(|host| IngressRule {
            host: host.clone(),
            http: HttpIngressRuleValue {
                paths: vec![HttpIngressPath {
                    path: "/".to_string(),
                    path_type: "Prefix".to_string(),
                    backend: IngressBackend {
                        service: IngressServiceBackend {
                            name: config.name.clone(),
                            port: ServiceBackendPort {
                                number: i32::from(ingress.port),
                            },
                        },
                    },
                }],
            },
        })
        .collect();

    Ok(Ingress::new(
        meta,
        IngressSpec {
            ingress_class_name: ingress.ingress_class.clone(),
            tls,
            rules,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{make_ingress, make_release, validated};
    use super::*;

    fn release_with_hosts(hosts: &[&str]) -> ValidatedRelease {
        let mut config = make_release();
        config.workload.as_mut().unwrap().ingress = Some(make_ingress(hosts, 8080));
        validated(config)
    }

    #[test]
    fn one_tls_entry_and_rule_per_hostname() {
        let release = release_with_hosts(&["example.com", "api.example.com"]);
        let ingress = synthesize_ingress(&release).unwrap();

        assert_eq!(ingress.spec.tls.len(), 2);
        assert_eq!(ingress.spec.tls[0].hosts, vec!["example.com"]);
        assert_eq!(ingress.spec.tls[0].secret_name, "example.com-tls");
        assert_eq!(ingress.spec.tls[1].secret_name, "api.example.com-tls");

        assert_eq!(ingress.spec.rules.len(), 2);
        assert_eq!(ingress.spec.rules[1].host, "api.example.com");
    }

    #[test]
    fn rules_route_to_the_release_service() {
        let release = release_with_hosts(&["example.com"]);
        let ingress = synthesize_ingress(&release).unwrap();

        let path = &ingress.spec.rules[0].http.paths[0];
        assert_eq!(path.path, "/");
        assert_eq!(path.path_type, "Prefix");
        assert_eq!(path.backend.service.name, "myapp");
        assert_eq!(path.backend.service.port.number, 8080);
    }

    #[test]
    fn issuer_and_redirect_annotations_are_attached() {
        let release = release_with_hosts(&["example.com"]);
        let ingress = synthesize_ingress(&release).unwrap();

        assert_eq!(
            ingress.metadata.annotations.get(CLUSTER_ISSUER_ANNOTATION),
            Some(&"letsencrypt-prod".to_string())
        );
        assert_eq!(
            ingress
                .metadata
                .annotations
                .get(FORCE_SSL_REDIRECT_ANNOTATION),
            Some(&"true".to_string())
        );
        assert_eq!(ingress.spec.ingress_class_name, "nginx");
    }
}
