//! `capk <package>`: security review of an AUR package's PKGBUILD.

use crate::chat_client::ChatClient;
use crate::conversation::Message;
use crate::http_client::HttpClient;
use anyhow::{bail, Context, Result};
use std::io::Write;
use std::sync::Arc;
use tracing::info;

const PKGBUILD_URL: &str = "https://aur.archlinux.org/cgit/aur.git/plain/PKGBUILD?h=";

const REVIEWER_PROMPT: &str = "You are a security expert. You will be given the PKGBUILD of an AUR package; \
analyze it for anything malicious: downloads from unexpected hosts, obfuscated commands, \
writes outside the package directory, or install hooks that phone home. \
If the text is clearly not a PKGBUILD, answer exactly: error: not a PKGBUILD\n\n\
A package name ending in -bin deserves extra suspicion, since malware has recently been uploaded to the AUR \
as prebuilt binaries. If the package is a well-known application, recommend installing it from a \
package manager without that risk.\n\n\
This is not sent by the user. Do not use markdown; what you say is viewed as plain text, \
no formatting like bold text or code blocks.";

/// Checks `name` against the AUR package name rules: lowercase
/// alphanumerics and `@._+-`, not starting with `-` or `.`.
pub fn validate_package_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Usage: capk <package>");
    }
    if name.starts_with('-') || name.starts_with('.') {
        bail!("Invalid package name {:?}: cannot start with '-' or '.'", name);
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || "@._+-".contains(*c)))
    {
        bail!("Invalid package name {:?}: unexpected character {:?}", name, c);
    }
    Ok(())
}

/// Removes the markdown emphasis and code markers the model tends to emit.
pub fn strip_markup(reply: &str) -> String {
    reply.chars().filter(|c| *c != '*' && *c != '`').collect()
}

/// Fetches PKGBUILDs and asks the chat service to review them.
pub struct PackageAuditor {
    http: Arc<dyn HttpClient>,
    client: Arc<dyn ChatClient>,
}

impl PackageAuditor {
    pub fn new(http: Arc<dyn HttpClient>, client: Arc<dyn ChatClient>) -> Self {
        Self { http, client }
    }

    /// Reviews `package`, reporting progress to `out`, and returns the verdict.
    pub async fn audit<W: Write>(&self, package: &str, out: &mut W) -> Result<String> {
        let package = package.trim();
        validate_package_name(package)?;

        writeln!(out, "Getting the PKGBUILD")?;
        let url = format!("{}{}", PKGBUILD_URL, package);
        let pkgbuild = self
            .http
            .get_text(&url)
            .await
            .with_context(|| format!("Could not fetch the PKGBUILD of {}", package))?;
        info!("Fetched {} bytes of PKGBUILD for {}", pkgbuild.len(), package);

        writeln!(out, "Analyzing {}", package)?;
        let messages = [
            Message::system(REVIEWER_PROMPT),
            Message::user(format!(
                "AUR Package Name: {}. This is the PKGBUILD: {}",
                package, pkgbuild
            )),
        ];
        let reply = self.client.chat(&messages).await?;
        Ok(strip_markup(&reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_client::mock::ScriptedChatClient;
    use crate::conversation::Role;
    use crate::http_client::mock::MockHttpClient;

    #[test]
    fn test_valid_package_names() {
        for name in ["yay", "google-chrome", "python-pip3", "lib32-glibc", "gtk+2", "foo@bar_1.0"] {
            assert!(validate_package_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_invalid_package_names() {
        for name in ["", "-yay", ".hidden", "Yay", "a b", "x&y", "pkg;rm", "../etc"] {
            assert!(validate_package_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("**Safe**: run `makepkg`"), "Safe: run makepkg");
    }

    #[tokio::test]
    async fn test_audit_fetches_and_reviews() {
        let http = Arc::new(MockHttpClient::new("pkgname=yay\nsource=(...)"));
        let chat = Arc::new(ScriptedChatClient::new(&["**Looks safe.**"]));
        let auditor = PackageAuditor::new(http.clone(), chat.clone());
        let mut out = Vec::new();

        let verdict = auditor.audit("yay", &mut out).await.unwrap();

        assert_eq!(verdict, "Looks safe.");
        assert_eq!(
            http.requests.lock().unwrap()[0].0,
            "https://aur.archlinux.org/cgit/aur.git/plain/PKGBUILD?h=yay"
        );
        let sent = &chat.requests()[0];
        assert_eq!(sent[0].role, Role::System);
        assert!(sent[0].text.contains("-bin"));
        assert!(sent[1].text.starts_with("AUR Package Name: yay."));
        assert!(sent[1].text.contains("pkgname=yay"));
        assert!(String::from_utf8(out).unwrap().contains("Getting the PKGBUILD"));
    }

    #[tokio::test]
    async fn test_invalid_name_makes_no_request() {
        let http = Arc::new(MockHttpClient::new(""));
        let chat = Arc::new(ScriptedChatClient::new(&[]));
        let auditor = PackageAuditor::new(http.clone(), chat);

        assert!(auditor.audit("yay; rm -rf ~", &mut Vec::new()).await.is_err());
        assert!(http.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported() {
        let http = Arc::new(MockHttpClient::failing("GET returned 404"));
        let chat = Arc::new(ScriptedChatClient::new(&[]));
        let auditor = PackageAuditor::new(http, chat.clone());

        let err = auditor.audit("nonexistent", &mut Vec::new()).await.unwrap_err();

        assert!(format!("{err:#}").contains("404"));
        assert!(chat.requests().is_empty());
    }
}
