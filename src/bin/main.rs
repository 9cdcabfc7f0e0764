use anyhow::{Context, Error};
use salesdash::{
    endpoints::{PasswordChange, Registration},
    flows,
    guards::{Navigation, Navigator},
    validate::LoginForm,
    ApiClient, FileStorage, SessionStore,
};
use serde_json::Value;
use std::path::PathBuf;
use structopt::StructOpt;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    let args = Args::from_args();

    log::debug!("Talking to {}", args.api_url);

    let storage = match &args.storage {
        Some(path) => FileStorage::new(path),
        None => FileStorage::default_location(),
    };
    log::debug!("Keeping the session in {}", storage.path().display());

    // restore whatever session we had last time before anything looks at it
    let session = SessionStore::restore(storage);
    let client = ApiClient::new(&args.api_url, session.clone())
        .context("Unable to create the API client")?;

    match args.cmd {
        Command::Login { phone, password } => {
            let form = LoginForm::new(phone, password);
            match flows::login(&client, &session, &form).await {
                Ok(logged_in) => {
                    println!("Logged in as {}", logged_in.user.display_name());
                    println!("-> {}", logged_in.redirect);
                },
                Err(e) => anyhow::bail!("{}", e.user_message()),
            }
        },
        Command::Logout => {
            let next = flows::logout(&session);
            println!("Logged out");
            println!("-> {}", next);
        },
        Command::Register {
            name,
            phone,
            email,
            address,
            password,
        } => {
            let registration = Registration {
                name,
                phone,
                email,
                address,
                password,
            };
            match flows::register(&client, &registration).await {
                Ok(next) => {
                    println!("Registered! Please log in.");
                    println!("-> {}", next);
                },
                Err(e) => anyhow::bail!("{}", e.user_message()),
            }
        },
        Command::Password {
            current,
            new,
            confirmation,
        } => {
            let confirmation = confirmation.unwrap_or_else(|| new.clone());
            let change = PasswordChange::new(current, new, confirmation);
            match flows::update_password(&client, &session, &change).await {
                Ok(next) => {
                    println!("Password updated. Please log in again.");
                    println!("-> {}", next);
                },
                Err(e) => anyhow::bail!("{}", e.user_message()),
            }
        },
        Command::Status => {
            let view = session.view();
            println!("hydrated:      {}", view.has_hydrated);
            println!("token:         {}", view.has_token);
            println!("user:          {}", view.has_user);
            println!("authenticated: {}", view.is_authenticated());
        },
        Command::Whoami => {
            let navigator = Navigator::new(session.clone(), client.clone());
            match navigator.navigate("/profile").await {
                Navigation::Render(_) => match session.user() {
                    Some(user) => {
                        println!("{}", serde_json::to_string_pretty(&user)?)
                    },
                    None => {
                        println!("Logged in, but the profile is unavailable")
                    },
                },
                Navigation::Redirect(to) => {
                    anyhow::bail!("Not logged in (redirected to {})", to)
                },
                Navigation::Pending => {
                    anyhow::bail!("The session hasn't been restored")
                },
            }
        },
        Command::Navigate { path } => {
            let navigator = Navigator::new(session.clone(), client.clone());
            match navigator.navigate(&path).await {
                Navigation::Render(route) => println!("render {}", route),
                Navigation::Redirect(route) => println!("redirect {}", route),
                Navigation::Pending => println!("pending"),
            }
        },
        Command::Get { path, query } => {
            let query = query
                .iter()
                .map(String::as_str)
                .map(parse_query)
                .collect::<Result<Vec<_>, _>>()?;
            match client.get::<_, Value>(&path, &query).await {
                Ok(body) => {
                    println!("{}", serde_json::to_string_pretty(&body)?)
                },
                Err(e) => {
                    let expired = flows::expire_if_rejected(&session, &e);
                    if let Some(next) = expired {
                        println!("Session expired, please log in again");
                        println!("-> {}", next);
                    }
                    return Err(e.into());
                },
            }
        },
    }

    Ok(())
}

fn parse_query(pair: &str) -> Result<(String, String), Error> {
    let (key, value) = pair
        .split_once('=')
        .with_context(|| format!("\"{}\" isn't a key=value pair", pair))?;

    Ok((key.to_string(), value.to_string()))
}

#[derive(Debug, StructOpt)]
#[structopt(about = "Talk to the sales dashboard API from the command line")]
struct Args {
    #[structopt(
        long = "api-url",
        env = "SALESDASH_API_URL",
        help = "The API's base URL (e.g. https://example.com/api/v1)"
    )]
    api_url: String,
    #[structopt(
        long = "storage",
        parse(from_os_str),
        help = "Where to keep the session between runs"
    )]
    storage: Option<PathBuf>,
    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Log in with a phone number and password.
    Login {
        #[structopt(short, long)]
        phone: String,
        #[structopt(
            short = "P",
            long,
            env = "SALESDASH_PASSWORD",
            hide_env_values = true
        )]
        password: String,
    },
    /// Forget the saved session.
    Logout,
    /// Create a new account.
    Register {
        #[structopt(long)]
        name: String,
        #[structopt(long)]
        phone: String,
        #[structopt(long)]
        email: String,
        #[structopt(long)]
        address: String,
        #[structopt(long, env = "SALESDASH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Change the current user's password. You'll be logged out afterwards.
    Password {
        #[structopt(long)]
        current: String,
        #[structopt(long)]
        new: String,
        /// Defaults to the new password.
        #[structopt(long)]
        confirmation: Option<String>,
    },
    /// Show the state of the saved session.
    Status,
    /// Show the logged in user's profile, fetching it if necessary.
    Whoami,
    /// Show what would happen when visiting a page.
    Navigate { path: String },
    /// Send an authenticated GET request and print the JSON response.
    Get {
        path: String,
        /// Query parameters as key=value.
        #[structopt(short, long)]
        query: Vec<String>,
    },
}
