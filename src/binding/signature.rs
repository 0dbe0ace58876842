//! Handler signatures
//!
//! A handler declares its parameter list up front with [`Signature`]; the
//! list is classified once into a [`HandlerDescriptor`] when the route is
//! registered.

use crate::error::ConfigError;

/// Name of the parameter that receives the request itself
pub const REQUEST_PARAM: &str = "request";

/// How a declared parameter is supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Plain named parameter, filled from path parameters
    Positional,
    /// Catch-all for extra positional values
    VarPositional,
    /// Must be supplied by name; required unless it has a default
    KeywordOnly { has_default: bool },
    /// Catch-all for extra named values
    VarKeyword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
}

/// Declared parameter list of a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    name: String,
    params: Vec<Param>,
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind,
        });
        self
    }

    #[must_use]
    pub fn positional(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::Positional)
    }

    /// Positional parameter named `request`
    #[must_use]
    pub fn request(self) -> Self {
        self.positional(REQUEST_PARAM)
    }

    #[must_use]
    pub fn var_positional(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::VarPositional)
    }

    /// Required keyword-only parameter
    #[must_use]
    pub fn keyword(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::KeywordOnly { has_default: false })
    }

    /// Optional keyword-only parameter
    #[must_use]
    pub fn keyword_with_default(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::KeywordOnly { has_default: true })
    }

    #[must_use]
    pub fn var_keyword(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::VarKeyword)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Comma separated parameter names, for route logs
    pub fn param_list(&self) -> String {
        self.params
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Classification of a handler's parameters, fixed at registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerDescriptor {
    pub name: String,
    pub has_request_arg: bool,
    pub has_var_kw_arg: bool,
    pub has_named_kw_args: bool,
    pub named_kw_args: Vec<String>,
    pub required_kw_args: Vec<String>,
}

impl HandlerDescriptor {
    pub fn analyze(signature: &Signature) -> Result<Self, ConfigError> {
        check_unique_names(signature)?;

        let has_request_arg = has_request_arg(signature)?;
        let named_kw_args: Vec<String> = signature
            .params
            .iter()
            .filter(|p| matches!(p.kind, ParamKind::KeywordOnly { .. }))
            .map(|p| p.name.clone())
            .collect();
        let required_kw_args = signature
            .params
            .iter()
            .filter(|p| p.kind == ParamKind::KeywordOnly { has_default: false })
            .map(|p| p.name.clone())
            .collect();

        Ok(Self {
            name: signature.name.clone(),
            has_request_arg,
            has_var_kw_arg: signature
                .params
                .iter()
                .any(|p| p.kind == ParamKind::VarKeyword),
            has_named_kw_args: !named_kw_args.is_empty(),
            named_kw_args,
            required_kw_args,
        })
    }

    /// Whether body or query data has to be decoded at all
    pub fn needs_extraction(&self) -> bool {
        self.has_var_kw_arg || self.has_named_kw_args || !self.required_kw_args.is_empty()
    }
}

/// `request` must be the last parameter that can be filled positionally
fn has_request_arg(signature: &Signature) -> Result<bool, ConfigError> {
    let mut found = false;
    for param in &signature.params {
        if param.name == REQUEST_PARAM {
            found = true;
            continue;
        }
        if found && param.kind == ParamKind::Positional {
            return Err(ConfigError::invalid_handler(
                &signature.name,
                format!(
                    "request parameter must be the last named parameter, \
                     found {:?} after it in ({})",
                    param.name,
                    signature.param_list()
                ),
            ));
        }
    }
    Ok(found)
}

fn check_unique_names(signature: &Signature) -> Result<(), ConfigError> {
    for (i, param) in signature.params.iter().enumerate() {
        if signature.params[..i].iter().any(|p| p.name == param.name) {
            return Err(ConfigError::invalid_handler(
                &signature.name,
                format!("duplicate parameter {:?}", param.name),
            ));
        }
    }

    for kind in [ParamKind::VarPositional, ParamKind::VarKeyword] {
        if signature.params.iter().filter(|p| p.kind == kind).count() > 1 {
            return Err(ConfigError::invalid_handler(
                &signature.name,
                format!("more than one {kind:?} parameter"),
            ));
        }
    }
    Ok(())
}
