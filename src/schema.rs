//! Static catalog of Kubernetes resource schemas.
//!
//! Immutable, process-wide, built once from source-embedded data. Each entry
//! names the kind, its API group/version, whether it is namespaced, the
//! required field paths, and a flat bare-field -> correct-path relocation
//! table. Everything is exposed through lookup functions so the tables stay
//! swappable in tests.

use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct ResourceSchema {
    pub kind: &'static str,
    pub api_version: &'static str,
    pub namespaced: bool,
    /// Dotted paths that a complete manifest of this kind carries.
    pub required_paths: &'static [&'static str],
    /// Bare field name -> fully qualified dotted path.
    pub field_paths: &'static [(&'static str, &'static str)],
}

/// Relocations valid for any kind.
pub const WILDCARD_PATHS: &[(&str, &str)] = &[
    ("name", "metadata.name"),
    ("namespace", "metadata.namespace"),
    ("labels", "metadata.labels"),
    ("annotations", "metadata.annotations"),
];

/// Pod-template fields that frequently end up directly under `spec`.
pub const POD_TEMPLATE_FIELDS: &[&str] = &[
    "containers",
    "initContainers",
    "volumes",
    "nodeSelector",
    "tolerations",
    "affinity",
    "serviceAccountName",
];

const WORKLOAD_REQUIRED: &[&str] = &[
    "apiVersion",
    "kind",
    "metadata",
    "spec",
    "spec.selector",
    "spec.template",
];

const POD_TEMPLATE_PATHS: &[(&str, &str)] = &[
    ("containers", "spec.template.spec.containers"),
    ("initContainers", "spec.template.spec.initContainers"),
    ("volumes", "spec.template.spec.volumes"),
    ("nodeSelector", "spec.template.spec.nodeSelector"),
    ("tolerations", "spec.template.spec.tolerations"),
    ("affinity", "spec.template.spec.affinity"),
    ("serviceAccountName", "spec.template.spec.serviceAccountName"),
    ("replicas", "spec.replicas"),
    ("selector", "spec.selector"),
    ("strategy", "spec.strategy"),
];

const SCHEMAS: &[ResourceSchema] = &[
    ResourceSchema {
        kind: "Pod",
        api_version: "v1",
        namespaced: true,
        required_paths: &["apiVersion", "kind", "metadata", "spec", "spec.containers"],
        field_paths: &[
            ("containers", "spec.containers"),
            ("initContainers", "spec.initContainers"),
            ("volumes", "spec.volumes"),
            ("nodeSelector", "spec.nodeSelector"),
            ("tolerations", "spec.tolerations"),
            ("restartPolicy", "spec.restartPolicy"),
            ("serviceAccountName", "spec.serviceAccountName"),
            ("hostNetwork", "spec.hostNetwork"),
        ],
    },
    ResourceSchema {
        kind: "Deployment",
        api_version: "apps/v1",
        namespaced: true,
        required_paths: WORKLOAD_REQUIRED,
        field_paths: POD_TEMPLATE_PATHS,
    },
    ResourceSchema {
        kind: "StatefulSet",
        api_version: "apps/v1",
        namespaced: true,
        required_paths: &[
            "apiVersion",
            "kind",
            "metadata",
            "spec",
            "spec.selector",
            "spec.serviceName",
            "spec.template",
        ],
        field_paths: POD_TEMPLATE_PATHS,
    },
    ResourceSchema {
        kind: "DaemonSet",
        api_version: "apps/v1",
        namespaced: true,
        required_paths: WORKLOAD_REQUIRED,
        field_paths: POD_TEMPLATE_PATHS,
    },
    ResourceSchema {
        kind: "ReplicaSet",
        api_version: "apps/v1",
        namespaced: true,
        required_paths: WORKLOAD_REQUIRED,
        field_paths: POD_TEMPLATE_PATHS,
    },
    ResourceSchema {
        kind: "Job",
        api_version: "batch/v1",
        namespaced: true,
        required_paths: &["apiVersion", "kind", "metadata", "spec", "spec.template"],
        field_paths: &[
            ("containers", "spec.template.spec.containers"),
            ("initContainers", "spec.template.spec.initContainers"),
            ("volumes", "spec.template.spec.volumes"),
            ("restartPolicy", "spec.template.spec.restartPolicy"),
            ("backoffLimit", "spec.backoffLimit"),
            ("completions", "spec.completions"),
            ("parallelism", "spec.parallelism"),
        ],
    },
    ResourceSchema {
        kind: "CronJob",
        api_version: "batch/v1",
        namespaced: true,
        required_paths: &[
            "apiVersion",
            "kind",
            "metadata",
            "spec",
            "spec.schedule",
            "spec.jobTemplate",
        ],
        field_paths: &[
            ("schedule", "spec.schedule"),
            ("containers", "spec.jobTemplate.spec.template.spec.containers"),
            ("initContainers", "spec.jobTemplate.spec.template.spec.initContainers"),
            ("volumes", "spec.jobTemplate.spec.template.spec.volumes"),
            ("restartPolicy", "spec.jobTemplate.spec.template.spec.restartPolicy"),
            ("concurrencyPolicy", "spec.concurrencyPolicy"),
            ("suspend", "spec.suspend"),
        ],
    },
    ResourceSchema {
        kind: "Service",
        api_version: "v1",
        namespaced: true,
        required_paths: &["apiVersion", "kind", "metadata", "spec"],
        field_paths: &[
            ("ports", "spec.ports"),
            ("selector", "spec.selector"),
            ("type", "spec.type"),
            ("clusterIP", "spec.clusterIP"),
            ("externalName", "spec.externalName"),
            ("sessionAffinity", "spec.sessionAffinity"),
        ],
    },
    ResourceSchema {
        kind: "ConfigMap",
        api_version: "v1",
        namespaced: true,
        required_paths: &["apiVersion", "kind", "metadata"],
        field_paths: &[("immutable", "immutable")],
    },
    ResourceSchema {
        kind: "Secret",
        api_version: "v1",
        namespaced: true,
        required_paths: &["apiVersion", "kind", "metadata"],
        field_paths: &[("type", "type"), ("immutable", "immutable")],
    },
    ResourceSchema {
        kind: "Ingress",
        api_version: "networking.k8s.io/v1",
        namespaced: true,
        required_paths: &["apiVersion", "kind", "metadata", "spec"],
        field_paths: &[
            ("rules", "spec.rules"),
            ("tls", "spec.tls"),
            ("ingressClassName", "spec.ingressClassName"),
            ("defaultBackend", "spec.defaultBackend"),
        ],
    },
    ResourceSchema {
        kind: "PersistentVolume",
        api_version: "v1",
        namespaced: false,
        required_paths: &["apiVersion", "kind", "metadata", "spec", "spec.capacity"],
        field_paths: &[
            ("capacity", "spec.capacity"),
            ("accessModes", "spec.accessModes"),
            ("storageClassName", "spec.storageClassName"),
            ("persistentVolumeReclaimPolicy", "spec.persistentVolumeReclaimPolicy"),
        ],
    },
    ResourceSchema {
        kind: "PersistentVolumeClaim",
        api_version: "v1",
        namespaced: true,
        required_paths: &["apiVersion", "kind", "metadata", "spec"],
        field_paths: &[
            ("accessModes", "spec.accessModes"),
            ("resources", "spec.resources"),
            ("storageClassName", "spec.storageClassName"),
            ("volumeName", "spec.volumeName"),
        ],
    },
    ResourceSchema {
        kind: "Namespace",
        api_version: "v1",
        namespaced: false,
        required_paths: &["apiVersion", "kind", "metadata"],
        field_paths: &[("finalizers", "spec.finalizers")],
    },
    ResourceSchema {
        kind: "ServiceAccount",
        api_version: "v1",
        namespaced: true,
        required_paths: &["apiVersion", "kind", "metadata"],
        field_paths: &[
            ("secrets", "secrets"),
            ("imagePullSecrets", "imagePullSecrets"),
            ("automountServiceAccountToken", "automountServiceAccountToken"),
        ],
    },
    ResourceSchema {
        kind: "Role",
        api_version: "rbac.authorization.k8s.io/v1",
        namespaced: true,
        required_paths: &["apiVersion", "kind", "metadata", "rules"],
        field_paths: &[("rules", "rules")],
    },
    ResourceSchema {
        kind: "RoleBinding",
        api_version: "rbac.authorization.k8s.io/v1",
        namespaced: true,
        required_paths: &["apiVersion", "kind", "metadata", "roleRef", "subjects"],
        field_paths: &[("roleRef", "roleRef"), ("subjects", "subjects")],
    },
    ResourceSchema {
        kind: "ClusterRole",
        api_version: "rbac.authorization.k8s.io/v1",
        namespaced: false,
        required_paths: &["apiVersion", "kind", "metadata", "rules"],
        field_paths: &[("rules", "rules"), ("aggregationRule", "aggregationRule")],
    },
    ResourceSchema {
        kind: "ClusterRoleBinding",
        api_version: "rbac.authorization.k8s.io/v1",
        namespaced: false,
        required_paths: &["apiVersion", "kind", "metadata", "roleRef", "subjects"],
        field_paths: &[("roleRef", "roleRef"), ("subjects", "subjects")],
    },
    ResourceSchema {
        kind: "NetworkPolicy",
        api_version: "networking.k8s.io/v1",
        namespaced: true,
        required_paths: &["apiVersion", "kind", "metadata", "spec", "spec.podSelector"],
        field_paths: &[
            ("podSelector", "spec.podSelector"),
            ("ingress", "spec.ingress"),
            ("egress", "spec.egress"),
            ("policyTypes", "spec.policyTypes"),
        ],
    },
    ResourceSchema {
        kind: "HorizontalPodAutoscaler",
        api_version: "autoscaling/v2",
        namespaced: true,
        required_paths: &[
            "apiVersion",
            "kind",
            "metadata",
            "spec",
            "spec.scaleTargetRef",
            "spec.maxReplicas",
        ],
        field_paths: &[
            ("scaleTargetRef", "spec.scaleTargetRef"),
            ("minReplicas", "spec.minReplicas"),
            ("maxReplicas", "spec.maxReplicas"),
            ("metrics", "spec.metrics"),
        ],
    },
    ResourceSchema {
        kind: "ResourceQuota",
        api_version: "v1",
        namespaced: true,
        required_paths: &["apiVersion", "kind", "metadata", "spec"],
        field_paths: &[("hard", "spec.hard"), ("scopes", "spec.scopes")],
    },
    ResourceSchema {
        kind: "LimitRange",
        api_version: "v1",
        namespaced: true,
        required_paths: &["apiVersion", "kind", "metadata", "spec"],
        field_paths: &[("limits", "spec.limits")],
    },
    ResourceSchema {
        kind: "Endpoints",
        api_version: "v1",
        namespaced: true,
        required_paths: &["apiVersion", "kind", "metadata"],
        field_paths: &[("subsets", "subsets")],
    },
    ResourceSchema {
        kind: "StorageClass",
        api_version: "storage.k8s.io/v1",
        namespaced: false,
        required_paths: &["apiVersion", "kind", "metadata", "provisioner"],
        field_paths: &[
            ("provisioner", "provisioner"),
            ("reclaimPolicy", "reclaimPolicy"),
            ("volumeBindingMode", "volumeBindingMode"),
            ("parameters", "parameters"),
        ],
    },
];

static BY_KIND: Lazy<HashMap<&'static str, &'static ResourceSchema>> =
    Lazy::new(|| SCHEMAS.iter().map(|s| (s.kind, s)).collect());

pub fn lookup(kind: &str) -> Option<&'static ResourceSchema> {
    BY_KIND.get(kind).copied()
}

pub fn registered_kinds() -> impl Iterator<Item = &'static str> {
    SCHEMAS.iter().map(|s| s.kind)
}

/// Where pod-template fields found directly under `spec` belong, per kind.
pub fn pod_template_prefix(kind: &str) -> Option<&'static str> {
    match kind {
        "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "Job" => {
            Some("spec.template.spec")
        }
        "CronJob" => Some("spec.jobTemplate.spec.template.spec"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_expected_kind_count() {
        assert_eq!(registered_kinds().count(), 25);
    }

    #[test]
    fn lookup_is_case_sensitive_and_keyed_by_kind() {
        assert!(lookup("Deployment").is_some());
        assert!(lookup("deployment").is_none());
        assert!(lookup("UnknownKind").is_none());
    }

    #[test]
    fn deployment_relocates_containers_into_template() {
        let schema = lookup("Deployment").unwrap();
        let (_, path) = schema
            .field_paths
            .iter()
            .find(|(f, _)| *f == "containers")
            .unwrap();
        assert_eq!(*path, "spec.template.spec.containers");
    }

    #[test]
    fn cronjob_uses_the_deeper_job_template_prefix() {
        assert_eq!(
            pod_template_prefix("CronJob"),
            Some("spec.jobTemplate.spec.template.spec")
        );
        assert_eq!(pod_template_prefix("Service"), None);
    }

    #[test]
    fn every_schema_requires_api_version_and_metadata() {
        for schema in SCHEMAS {
            assert!(schema.required_paths.contains(&"apiVersion"), "{}", schema.kind);
            assert!(schema.required_paths.contains(&"metadata"), "{}", schema.kind);
        }
    }
}
