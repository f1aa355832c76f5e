//! Network service synthesis: one ClusterIP Service per release workload

use stevedore_common::config::ValidatedRelease;
use stevedore_common::{Error, Result};

use crate::k8s::{Service, ServicePort, ServiceSpec};

use super::{object_meta, selector_labels};

/// Synthesize the Service exposing a release's workload containers.
///
/// One port per container, named after the container, targeting the same
/// port the container listens on.
pub fn synthesize_service(release: &ValidatedRelease) -> Result<Service> {
    let config = release.config();
    let workload = config
        .workload
        .as_ref()
        .ok_or_else(|| Error::internal("synthesizer", "no workload section declared"))?;

    let meta = object_meta(config, &config.name, &workload.labels, &workload.annotations)?;

    let ports = workload
        .containers
        .iter()
        .map(|c| ServicePort {
            name: c.name.clone(),
            port: i32::from(c.port),
            target_port: i32::from(c.port),
            protocol: "TCP".to_string(),
        })
        .collect();

    Ok(Service::new(
        meta,
        ServiceSpec {
            type_: "ClusterIP".to_string(),
            selector: selector_labels(&config.name),
            ports,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{make_container, make_release, validated};
    use super::*;
    use stevedore_common::labels::RELEASE_LABEL;

    #[test]
    fn service_selects_release_pods() {
        let release = validated(make_release());
        let service = synthesize_service(&release).unwrap();

        assert_eq!(service.metadata.name, "myapp");
        assert_eq!(service.spec.type_, "ClusterIP");
        assert_eq!(
            service.spec.selector.get(RELEASE_LABEL),
            Some(&"myapp".to_string())
        );
    }

    #[test]
    fn one_port_per_container() {
        let mut config = make_release();
        let mut second = make_container("metrics");
        second.port = 9100;
        config.workload.as_mut().unwrap().containers.push(second);
        let release = validated(config);

        let service = synthesize_service(&release).unwrap();
        assert_eq!(service.spec.ports.len(), 2);
        assert_eq!(service.spec.ports[0].name, "app");
        assert_eq!(service.spec.ports[0].port, 8080);
        assert_eq!(service.spec.ports[1].name, "metrics");
        assert_eq!(service.spec.ports[1].target_port, 9100);
    }
}
