use serde::{Deserialize, Serialize};

/// The secret contract a stack declares in `hostk8s.secrets.yaml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecretContract {
    pub spec: ContractSpec,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractSpec {
    #[serde(default)]
    pub secrets: Vec<SecretEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecretEntry {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub data: Vec<DataEntry>,
}

/// One key of a secret: either a static `value` or a `generate` directive.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataEntry {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn contract_parses() {
        let yaml = r#"
apiVersion: hostk8s.io/v1
kind: SecretContract
spec:
  secrets:
    - name: app-db
      namespace: sample
      data:
        - key: username
          value: admin
        - key: password
          generate: password
          length: 24
        - key: session-id
          generate: uuid
"#;
        let contract: SecretContract = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(contract.spec.secrets.len(), 1);
        let entry = &contract.spec.secrets[0];
        assert_eq!(entry.name, "app-db");
        assert_eq!(entry.data[1].generate.as_deref(), Some("password"));
        assert_eq!(entry.data[1].length, Some(24));
        assert_eq!(entry.data[0].value.as_deref(), Some("admin"));
    }
}
