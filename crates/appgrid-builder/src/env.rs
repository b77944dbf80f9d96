//! Per-instance environment assembly.

use appgrid_models::EnvVar;
use serde_json::{json, Map, Value};

/// Assemble the environment for one instance of a desired LRP.
///
/// Appends the platform's fixed entries, then — only if the declaration
/// already carries a `VCAP_APPLICATION` entry — overlays the instance
/// identity into that JSON object in place. An absent `VCAP_APPLICATION`
/// is never synthesised.
///
/// Not idempotent: re-applying to an already-assembled environment
/// appends the fixed entries a second time. Callers that need to
/// re-assemble must strip the added entries first.
pub fn build_env(
    env: &[EnvVar],
    process_guid: &str,
    index: u32,
) -> Result<Vec<EnvVar>, serde_json::Error> {
    let mut env = env.to_vec();
    env.push(EnvVar::new("PORT", "8080"));
    env.push(EnvVar::new("VCAP_APP_PORT", "8080"));
    env.push(EnvVar::new("VCAP_APP_HOST", "0.0.0.0"));
    env.push(EnvVar::new("TMPDIR", "$HOME/tmp"));

    let Some(pos) = env.iter().position(|e| e.name == "VCAP_APPLICATION") else {
        return Ok(env);
    };

    // Must parse as a JSON object; anything else surfaces as the parse
    // error and leaves the caller's environment untouched.
    let mut vcap: Map<String, Value> = serde_json::from_str(&env[pos].value)?;
    vcap.insert("port".to_string(), json!(8080));
    vcap.insert("host".to_string(), json!("0.0.0.0"));
    vcap.insert("instance_id".to_string(), json!(process_guid));
    vcap.insert("instance_index".to_string(), json!(index));

    env[pos].value = serde_json::to_string(&vcap)?;
    Ok(env)
}
