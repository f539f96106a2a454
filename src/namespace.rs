//! The fixed, ordered table of tracked namespaces.
//!
//! Classification is first-match in declaration order. A parent namespace
//! that has its own tracked children lists them as exclusions so that the
//! children fall through to their own, later-declared entries.

use serde::Serialize;
use std::fmt;

macro_rules! namespaces {
    ($( $variant:ident => $name:literal $( except [$($excluded:literal),* $(,)?] )? ),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum Namespace {
            $($variant),*
        }

        impl Namespace {
            /// Every tracked namespace, in declaration (classification) order.
            pub const ALL: &'static [Namespace] = &[$(Namespace::$variant),*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Namespace::$variant => $name),*
                }
            }

            pub fn excluded_prefixes(self) -> &'static [&'static str] {
                match self {
                    $(Namespace::$variant => &[$($($excluded),*)?]),*
                }
            }
        }
    };
}

namespaces! {
    JavaxActivation => "javax.activation",
    JakartaActivation => "jakarta.activation",
    JavaxAnnotation => "javax.annotation" except ["javax.annotation.processing"],
    JakartaAnnotation => "jakarta.annotation",
    JavaxBatch => "javax.batch",
    JakartaBatch => "jakarta.batch",
    JavaxDecorator => "javax.decorator",
    JakartaDecorator => "jakarta.decorator",
    JavaxEjb => "javax.ejb",
    JakartaEjb => "jakarta.ejb",
    JavaxEl => "javax.el",
    JakartaEl => "jakarta.el",
    JavaxEnterprise => "javax.enterprise" except ["javax.enterprise.concurrent", "javax.enterprise.deploy"],
    JakartaEnterprise => "jakarta.enterprise" except ["jakarta.enterprise.concurrent", "jakarta.enterprise.deploy"],
    JavaxEnterpriseConcurrent => "javax.enterprise.concurrent",
    JakartaEnterpriseConcurrent => "jakarta.enterprise.concurrent",
    JavaxEnterpriseDeploy => "javax.enterprise.deploy",
    JakartaEnterpriseDeploy => "jakarta.enterprise.deploy",
    JavaxFaces => "javax.faces",
    JakartaFaces => "jakarta.faces",
    JavaxInject => "javax.inject",
    JakartaInject => "jakarta.inject",
    JavaxInterceptor => "javax.interceptor",
    JakartaInterceptor => "jakarta.interceptor",
    JavaxJms => "javax.jms",
    JakartaJms => "jakarta.jms",
    JavaxJson => "javax.json" except ["javax.json.bind"],
    JakartaJson => "jakarta.json" except ["jakarta.json.bind"],
    JavaxJsonBind => "javax.json.bind",
    JakartaJsonBind => "jakarta.json.bind",
    JavaxJws => "javax.jws",
    JakartaJws => "jakarta.jws",
    JavaxMail => "javax.mail",
    JakartaMail => "jakarta.mail",
    JavaxManagementJ2ee => "javax.management.j2ee",
    JakartaManagementJ2ee => "jakarta.management.j2ee",
    JavaxPersistence => "javax.persistence",
    JakartaPersistence => "jakarta.persistence",
    JavaxResource => "javax.resource",
    JakartaResource => "jakarta.resource",
    JavaxSecurityAuthMessage => "javax.security.auth.message",
    JakartaSecurityAuthMessage => "jakarta.security.auth.message",
    JavaxSecurityEnterprise => "javax.security.enterprise",
    JakartaSecurityEnterprise => "jakarta.security.enterprise",
    JavaxSecurityJacc => "javax.security.jacc",
    JakartaSecurityJacc => "jakarta.security.jacc",
    JavaxServlet => "javax.servlet",
    JakartaServlet => "jakarta.servlet",
    JavaxTransaction => "javax.transaction" except ["javax.transaction.xa"],
    JakartaTransaction => "jakarta.transaction",
    JavaxValidation => "javax.validation",
    JakartaValidation => "jakarta.validation",
    JavaxWebsocket => "javax.websocket",
    JakartaWebsocket => "jakarta.websocket",
    JavaxWsRs => "javax.ws.rs",
    JakartaWsRs => "jakarta.ws.rs",
    JavaxXmlBind => "javax.xml.bind",
    JakartaXmlBind => "jakarta.xml.bind",
    JavaxXmlRegistry => "javax.xml.registry",
    JakartaXmlRegistry => "jakarta.xml.registry",
    JavaxXmlRpc => "javax.xml.rpc",
    JakartaXmlRpc => "jakarta.xml.rpc",
    JavaxXmlSoap => "javax.xml.soap",
    JakartaXmlSoap => "jakarta.xml.soap",
    JavaxXmlWs => "javax.xml.ws",
    JakartaXmlWs => "jakarta.xml.ws",
}

/// Family prefix of the pre-rename spellings.
pub const LEGACY_FAMILY: &str = "javax.";
/// Family prefix of the renamed spellings.
pub const RENAMED_FAMILY: &str = "jakarta.";

impl Namespace {
    pub fn matches(self, reference: &str) -> bool {
        reference.starts_with(self.name())
            && !self
                .excluded_prefixes()
                .iter()
                .any(|excluded| reference.starts_with(excluded))
    }

    pub fn is_legacy(self) -> bool {
        self.name().starts_with(LEGACY_FAMILY)
    }

    pub fn from_name(name: &str) -> Option<Namespace> {
        Namespace::ALL.iter().copied().find(|ns| ns.name() == name)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the first namespace, in declaration order, that claims `reference`.
pub fn classify(reference: &str) -> Option<Namespace> {
    Namespace::ALL.iter().copied().find(|ns| ns.matches(reference))
}
