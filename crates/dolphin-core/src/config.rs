use crate::cluster::MysqlClusterSpec;
use sha2::{Digest, Sha256};

/// Render the `my.cnf` fragment shipped in the cluster config map.
///
/// Keys come out sorted, so the rendering is deterministic.
pub fn render_my_cnf(spec: &MysqlClusterSpec) -> String {
    let mut out = String::from("[mysqld]\n");
    for (key, value) in &spec.mysql_conf {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Hex SHA-256 digest of the effective MySQL configuration
pub fn config_hash(spec: &MysqlClusterSpec) -> String {
    let digest = Sha256::digest(render_my_cnf(spec).as_bytes());
    format!("{:x}", digest)
}
