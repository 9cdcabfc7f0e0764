use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// Every page in the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Root,
    Login,
    Register,
    Dashboard,
    Profile,
    Customers,
    NewCustomer,
    Customer { code: String },
    EditCustomer { code: String },
    Transactions,
    Transaction { reference: String },
    Summary,
    NotFound { path: String },
}

/// Who may visit a [`Route`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Access {
    /// Only visitors who aren't logged in (login, register).
    Guest,
    /// Only visitors holding a token.
    Protected,
    /// Anyone.
    Public,
}

impl Route {
    /// Where unauthenticated visitors are sent.
    pub const LOGIN: Route = Route::Login;
    /// Where authenticated visitors land.
    pub const LANDING: Route = Route::Dashboard;

    pub fn parse(path: &str) -> Route {
        let segments: Vec<&str> = path
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or_default()
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match segments.as_slice() {
            [] => Route::Root,
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            ["dashboard"] => Route::Dashboard,
            ["profile"] => Route::Profile,
            ["customers"] => Route::Customers,
            ["customers", "new"] => Route::NewCustomer,
            ["customers", code] => Route::Customer {
                code: code.to_string(),
            },
            ["customers", code, "edit"] => Route::EditCustomer {
                code: code.to_string(),
            },
            ["transactions"] => Route::Transactions,
            ["transactions", reference] => Route::Transaction {
                reference: reference.to_string(),
            },
            ["summary"] => Route::Summary,
            _ => Route::NotFound {
                path: path.to_string(),
            },
        }
    }

    pub fn access(&self) -> Access {
        match self {
            Route::Root | Route::Login | Route::Register => Access::Guest,
            Route::NotFound { .. } => Access::Public,
            _ => Access::Protected,
        }
    }

    /// Some routes only exist to send you somewhere else.
    pub fn redirects_to(&self) -> Option<Route> {
        match self {
            Route::Root => Some(Route::Login),
            _ => None,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Root => String::from("/"),
            Route::Login => String::from("/login"),
            Route::Register => String::from("/register"),
            Route::Dashboard => String::from("/dashboard"),
            Route::Profile => String::from("/profile"),
            Route::Customers => String::from("/customers"),
            Route::NewCustomer => String::from("/customers/new"),
            Route::Customer { code } => format!("/customers/{}", code),
            Route::EditCustomer { code } => {
                format!("/customers/{}/edit", code)
            },
            Route::Transactions => String::from("/transactions"),
            Route::Transaction { reference } => {
                format!("/transactions/{}", reference)
            },
            Route::Summary => String::from("/summary"),
            Route::NotFound { path } => path.clone(),
        }
    }
}

impl FromStr for Route {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Route, Self::Err> { Ok(Route::parse(s)) }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
