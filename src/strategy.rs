//! Acquisition strategy selection.

use crate::config::{IdentityToken, LoginConfig};

/// A way of obtaining a new access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Exchange the cached refresh token. Failure falls through to the next strategy.
    RefreshToken,
    /// Exchange a configured OIDC identity token. No user interaction.
    DirectExchange(IdentityToken),
    /// Run the interactive browser login.
    InteractiveLogin,
}

impl Strategy {
    /// The strategies to attempt for `config`, in order.
    ///
    /// The last entry is always the one whose failure is reported.
    pub fn plan(config: &LoginConfig) -> Vec<Strategy> {
        let mut plan = Vec::with_capacity(2);
        if config.use_refresh_tokens {
            plan.push(Strategy::RefreshToken);
        }
        match config.identity_token() {
            Some(token) => plan.push(Strategy::DirectExchange(token)),
            None => plan.push(Strategy::InteractiveLogin),
        }
        plan
    }

    /// Whether a failure of this strategy moves on to the next one.
    pub fn falls_through(&self) -> bool {
        matches!(self, Strategy::RefreshToken)
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::RefreshToken => "refresh_token",
            Strategy::DirectExchange(_) => "direct_exchange",
            Strategy::InteractiveLogin => "interactive_login",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_defaults_to_interactive_login() {
        let plan = Strategy::plan(&LoginConfig::default());
        assert_eq!(plan, vec![Strategy::InteractiveLogin]);
    }

    #[test]
    fn test_plan_with_identity_token() {
        let cfg = LoginConfig::default().with_identity_token("eyJ.a.b");
        assert_eq!(
            Strategy::plan(&cfg),
            vec![Strategy::DirectExchange(IdentityToken::new("eyJ.a.b"))]
        );
    }

    #[test]
    fn test_plan_refresh_first() {
        let cfg = LoginConfig::default().with_refresh_tokens(true);
        assert_eq!(
            Strategy::plan(&cfg),
            vec![Strategy::RefreshToken, Strategy::InteractiveLogin]
        );

        let cfg = cfg.with_identity_token("/var/run/oidc");
        let plan = Strategy::plan(&cfg);
        assert_eq!(plan.len(), 2);
        assert!(plan[0].falls_through());
        assert!(!plan[1].falls_through());
        assert_eq!(plan[1].name(), "direct_exchange");
    }
}
