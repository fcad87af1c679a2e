use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use users_sdk::{Address, CreateUser, ListUsers, UpdateUser, UsersClient};

#[derive(Parser)]
#[command(name = "users-cli")]
#[command(about = "Command-line client for the users API", long_about = None)]
struct Cli {
    #[arg(short, long, env = "USERS_API_URL", default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service health
    Health,
    /// List users page by page
    List {
        #[arg(long)]
        page: Option<String>,
        #[arg(long)]
        limit: Option<String>,
        #[arg(long)]
        sort_by: Option<String>,
    },
    /// Show one user
    Get { id: String },
    /// Create a user
    Create(UserFields),
    /// Update fields of a user
    Update {
        id: String,
        #[command(flatten)]
        fields: UpdateFields,
    },
    /// Delete a user
    Delete { id: String },
    /// Find users with an address in a city
    Search { city: String },
}

#[derive(Args)]
struct UserFields {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    age: Option<f64>,
    /// Address as "street;city;country;postal_code" (repeatable)
    #[arg(long = "address", value_parser = parse_address)]
    addresses: Vec<Address>,
}

#[derive(Args)]
struct UpdateFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    age: Option<f64>,
    /// Replaces all addresses when given (repeatable)
    #[arg(long = "address", value_parser = parse_address)]
    addresses: Vec<Address>,
}

fn parse_address(raw: &str) -> Result<Address, String> {
    let parts: Vec<&str> = raw.split(';').map(str::trim).collect();
    match parts.as_slice() {
        [street, city, country, postal_code] => Ok(Address {
            street: street.to_string(),
            city: city.to_string(),
            country: country.to_string(),
            postal_code: postal_code.to_string(),
        }),
        _ => Err(format!("expected street;city;country;postal_code, got '{raw}'")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = UsersClient::new(&cli.url);

    let result = match cli.command {
        Commands::Health => client.health().await.map(|v| pretty(&v)),
        Commands::List { page, limit, sort_by } => {
            let query = ListUsers { page, limit, sort_by };
            client.list_users(&query).await.map(|page| {
                pretty(&serde_json::json!({
                    "currentPage": page.current_page,
                    "totalPages": page.total_pages,
                    "totalUsers": page.total_users,
                    "users": page.users,
                }))
            })
        }
        Commands::Get { id } => client.get_user(&id).await.map(|u| pretty(&u)),
        Commands::Create(fields) => {
            let user = CreateUser {
                name: fields.name,
                email: fields.email,
                age: fields.age,
                addresses: fields.addresses,
            };
            client.create_user(&user).await.map(|u| pretty(&u))
        }
        Commands::Update { id, fields } => {
            let patch = UpdateUser {
                name: fields.name,
                email: fields.email,
                age: fields.age,
                addresses: (!fields.addresses.is_empty()).then_some(fields.addresses),
            };
            client.update_user(&id, &patch).await.map(|u| pretty(&u))
        }
        Commands::Delete { id } => client.delete_user(&id).await,
        Commands::Search { city } => client.search_by_city(&city).await.map(|users| pretty(&users)),
    };

    match result {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unprintable: {e}>"))
}
