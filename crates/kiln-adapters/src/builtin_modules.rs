//! The modules that ship with Kiln.
//!
//! [`catalog`] returns every built-in descriptor; [`registry`] registers them.
//! Directory modules loaded with [`FilesystemModuleLoader`] can be layered on
//! top with [`registry_with`], replacing built-ins that share an id.
//!
//! Generated projects are TypeScript/Node layouts. Every archetype has exactly
//! one baseline, so each target gets a non-empty scaffold even when no module
//! is requested.
//!
//! [`FilesystemModuleLoader`]: crate::module_loader::FilesystemModuleLoader

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{info, instrument, warn};

use kiln_core::domain::{
    Archetype, AuthStrategy, DomainError, FileContribution, Framework, ModuleConfig,
    ModuleDescriptor, ModuleRegistry, TargetSupport,
};

use crate::module_loader::{FilesystemModuleLoader, LoadError};

// ── Public API ────────────────────────────────────────────────────────────────

/// Every built-in module descriptor.
pub fn catalog() -> Result<Vec<ModuleDescriptor>, DomainError> {
    let mut modules = Archetype::ALL
        .iter()
        .map(|a| baseline(*a))
        .collect::<Result<Vec<_>, _>>()?;

    modules.extend([
        config_env()?,
        http_client()?,
        auth_jwt()?,
        auth_oauth()?,
        auth_session()?,
        auth_provider("auth-provider-a", 10)?,
        auth_provider("auth-provider-b", 5)?,
        payment_stripe()?,
        storage_local()?,
        storage_s3()?,
        database_postgres()?,
        database_sqlite()?,
        email_smtp()?,
        messaging_redis()?,
    ]);
    Ok(modules)
}

/// A registry holding the built-in catalog.
pub fn registry() -> Result<ModuleRegistry, DomainError> {
    ModuleRegistry::from_descriptors(catalog()?)
}

/// The built-in catalog plus every module found under `dirs`.
///
/// A directory module with the id of a built-in replaces it. Later
/// directories win over earlier ones.
#[instrument(skip_all, fields(dirs = dirs.len()))]
pub fn registry_with(dirs: &[PathBuf]) -> Result<ModuleRegistry, LoadError> {
    let mut by_id: BTreeMap<String, ModuleDescriptor> = catalog()?
        .into_iter()
        .map(|m| (m.id.to_string(), m))
        .collect();

    for dir in dirs {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "module directory not found, skipping");
            continue;
        }
        for module in FilesystemModuleLoader::new(dir).load_all()? {
            if by_id.contains_key(module.id.as_str()) {
                info!(id = %module.id, dir = %dir.display(), "directory module replaces built-in");
            }
            by_id.insert(module.id.to_string(), module);
        }
    }

    Ok(ModuleRegistry::from_descriptors(by_id.into_values())?)
}

// ── Baselines ─────────────────────────────────────────────────────────────────

const PACKAGE_JSON: &str = r#"{
  "name": "{{PROJECT_NAME_KEBAB}}",
  "version": "0.1.0",
  "private": true,
  "description": "{{PROJECT_NAME}} ({{FRAMEWORK}}, {{ARCHETYPE}})",
  "scripts": {
    "build": "tsc -p .",
    "start": "node dist/index.js"
  },
  "dependencies": {},
  "devDependencies": {
    "typescript": "^5.4.0"
  }
}
"#;

const TSCONFIG: &str = r#"{
  "compilerOptions": {
    "target": "ES2022",
    "module": "commonjs",
    "outDir": "dist",
    "strict": true,
    "esModuleInterop": true
  },
  "include": ["src"]
}
"#;

fn baseline(archetype: Archetype) -> Result<ModuleDescriptor, DomainError> {
    let builder = ModuleDescriptor::builder(format!("baseline-{archetype}"))
        .baseline()
        .priority(-100)
        .support(TargetSupport::archetype(archetype))
        .description(format!("Project skeleton for the {archetype} archetype"))
        .tag("baseline")
        .file(FileContribution::new("package.json", PACKAGE_JSON))
        .file(FileContribution::new("tsconfig.json", TSCONFIG))
        .file(FileContribution::new(
            "README.md",
            "# {{PROJECT_NAME}}\n\nA {{FRAMEWORK}} project ({{ARCHETYPE}}).\n\n## Getting started\n\n```sh\nnpm install\nnpm run build\n```\n",
        ))
        .file(FileContribution::new(
            ".gitignore",
            "node_modules/\ndist/\n.env\n",
        ))
        .file(FileContribution::new(
            "src/index.ts",
            "// Entry point for {{PROJECT_NAME}}\n\nexport function main(): void {\n  console.log(\"{{PROJECT_NAME_KEBAB}} started\");\n}\n\nmain();\n",
        ))
        .manifest("typescript", "^5.4.0");

    let builder = match archetype {
        Archetype::Foundation => builder,
        Archetype::Business => builder.file(FileContribution::new(
            "src/domain/index.ts",
            "// Business rules for {{PROJECT_NAME}} live here.\nexport {};\n",
        )),
        Archetype::Performance => builder.file(FileContribution::new(
            "bench/index.ts",
            "// Benchmarks for {{PROJECT_NAME}}.\nexport {};\n",
        )),
        Archetype::CrossPlatform => builder.file(FileContribution::new(
            "src/platform/index.ts",
            "export const platform = \"{{FRAMEWORK}}\";\n",
        )),
    };
    builder.build()
}

// ── Shared infrastructure ─────────────────────────────────────────────────────

fn config_env() -> Result<ModuleDescriptor, DomainError> {
    ModuleDescriptor::builder("config-env")
        .version("1.2.0")
        .description("Environment-based configuration with dotenv")
        .tag("config")
        .file(FileContribution::new(
            ".env.example",
            "NODE_ENV=\"development\"\nAPP_NAME=\"{{PROJECT_NAME}}\"\n",
        ))
        .file(FileContribution::new(
            "src/config/env.ts",
            "import \"dotenv/config\";\n\nexport function env(name: string, fallback?: string): string {\n  const value = process.env[name] ?? fallback;\n  if (value === undefined) {\n    throw new Error(`missing environment variable ${name}`);\n  }\n  return value;\n}\n",
        ))
        .file(
            FileContribution::new(
                "package.json",
                r#"{"dependencies": {"dotenv": "^16.3.0"}}"#,
            )
            .structured(),
        )
        .manifest("dotenv", "^16.3.0")
        .build()
}

fn http_client() -> Result<ModuleDescriptor, DomainError> {
    ModuleDescriptor::builder("http-client")
        .description("Shared HTTP client")
        .tag("http")
        .file(FileContribution::new(
            "src/lib/http.ts",
            "import axios from \"axios\";\n\nexport const http = axios.create({\n  headers: { \"user-agent\": \"{{PROJECT_NAME_KEBAB}}\" },\n  timeout: 10_000,\n});\n",
        ))
        .file(
            FileContribution::new("package.json", r#"{"dependencies": {"axios": "^1.6.0"}}"#)
                .structured(),
        )
        .manifest("axios", "^1.6.0")
        .build()
}

// ── Authentication ────────────────────────────────────────────────────────────

fn auth_jwt() -> Result<ModuleDescriptor, DomainError> {
    ModuleDescriptor::builder("auth-jwt")
        .version("1.1.0")
        .category("auth")
        .priority(20)
        .depends_on("config-env@^1.0.0")
        .description("Stateless JWT authentication")
        .tag("auth")
        .config(ModuleConfig::Auth {
            strategy: AuthStrategy::Jwt,
            token_ttl_secs: 3600,
            issuer: None,
        })
        .default_var("JWT_SECRET", "change-me")
        .file(
            FileContribution::new(".env.example", "JWT_SECRET=\"{{JWT_SECRET}}\"\n").append(),
        )
        .file(FileContribution::new(
            "src/auth/jwt.ts",
            "import { SignJWT, jwtVerify } from \"jose\";\nimport { env } from \"../config/env\";\n\nconst secret = new TextEncoder().encode(env(\"JWT_SECRET\"));\nconst ttlSeconds = {{AUTH_TOKEN_TTL_SECS}};\n\nexport async function issue(subject: string): Promise<string> {\n  return new SignJWT({})\n    .setProtectedHeader({ alg: \"HS256\" })\n    .setSubject(subject)\n    .setExpirationTime(`${ttlSeconds}s`)\n    .sign(secret);\n}\n\nexport async function verify(token: string) {\n  return (await jwtVerify(token, secret)).payload;\n}\n",
        ))
        .file(
            FileContribution::new("package.json", r#"{"dependencies": {"jose": "^5.2.0"}}"#)
                .structured(),
        )
        .manifest("jose", "^5.2.0")
        .manifest("dotenv", "^16.0.0")
        .build()
}

fn auth_oauth() -> Result<ModuleDescriptor, DomainError> {
    ModuleDescriptor::builder("auth-oauth")
        .category("auth")
        .priority(10)
        .depends_on("config-env")
        .depends_on("http-client")
        .support(TargetSupport::frameworks([
            Framework::WebApp,
            Framework::Api,
            Framework::Mobile,
        ]))
        .description("OAuth 2.0 authorization-code flow")
        .tag("auth")
        .config(ModuleConfig::Auth {
            strategy: AuthStrategy::OAuth,
            token_ttl_secs: 900,
            issuer: Some("https://accounts.example.com".into()),
        })
        .default_var("OAUTH_CLIENT_ID", "your-client-id")
        .file(
            FileContribution::new(
                ".env.example",
                "OAUTH_CLIENT_ID=\"{{OAUTH_CLIENT_ID}}\"\nOAUTH_ISSUER=\"{{AUTH_ISSUER}}\"\n",
            )
            .append(),
        )
        .file(FileContribution::new(
            "src/auth/oauth.ts",
            "import { http } from \"../lib/http\";\nimport { env } from \"../config/env\";\n\nexport async function exchange(code: string) {\n  const issuer = env(\"OAUTH_ISSUER\", \"{{AUTH_ISSUER}}\");\n  const { data } = await http.post(`${issuer}/token`, {\n    grant_type: \"authorization_code\",\n    client_id: env(\"OAUTH_CLIENT_ID\"),\n    code,\n  });\n  return data;\n}\n",
        ))
        .build()
}

fn auth_session() -> Result<ModuleDescriptor, DomainError> {
    ModuleDescriptor::builder("auth-session")
        .category("auth")
        .support(TargetSupport::frameworks([Framework::WebApp, Framework::Api]))
        .description("Cookie-backed server sessions")
        .tag("auth")
        .config(ModuleConfig::Auth {
            strategy: AuthStrategy::Session,
            token_ttl_secs: 86_400,
            issuer: None,
        })
        .file(FileContribution::new(
            "src/auth/session.ts",
            "import session from \"express-session\";\n\nexport const sessions = session({\n  name: \"{{PROJECT_NAME_SNAKE}}_sid\",\n  secret: process.env.SESSION_SECRET ?? \"change-me\",\n  cookie: { maxAge: {{AUTH_TOKEN_TTL_SECS}} * 1000 },\n  resave: false,\n  saveUninitialized: false,\n});\n",
        ))
        .file(
            FileContribution::new(
                "package.json",
                r#"{"dependencies": {"express-session": "^1.18.0"}}"#,
            )
            .structured(),
        )
        .manifest("express-session", "^1.18.0")
        .build()
}

/// Interchangeable identity-provider integrations sharing the `auth` slot.
fn auth_provider(id: &str, priority: i32) -> Result<ModuleDescriptor, DomainError> {
    ModuleDescriptor::builder(id)
        .category("auth")
        .priority(priority)
        .description(format!("Hosted identity provider integration ({id})"))
        .tag("auth")
        .file(FileContribution::new(
            format!("src/auth/{id}.ts").as_str(),
            "export const provider = \"{{MODULE_ID}}\";\nexport const tokenTtlSeconds = {{AUTH_TOKEN_TTL_SECS}};\n",
        ))
        .build()
}

// ── Business features ─────────────────────────────────────────────────────────

fn payment_stripe() -> Result<ModuleDescriptor, DomainError> {
    ModuleDescriptor::builder("payment-stripe")
        .version("2.0.0")
        .category("payments")
        .depends_on("config-env@^1.0.0")
        .depends_on("http-client")
        .support(TargetSupport::frameworks([Framework::WebApp, Framework::Api]))
        .description("Stripe checkout and webhooks")
        .tag("payments")
        .config(ModuleConfig::Payments {
            provider: "stripe".into(),
            currency: "USD".into(),
            webhooks: true,
        })
        .default_var("STRIPE_SECRET_KEY", "sk_test_change_me")
        .file(
            FileContribution::new(
                ".env.example",
                "STRIPE_SECRET_KEY=\"{{STRIPE_SECRET_KEY}}\"\nPAYMENT_CURRENCY=\"{{PAYMENT_CURRENCY}}\"\n",
            )
            .append(),
        )
        .file(FileContribution::new(
            "src/payments/stripe.ts",
            "import Stripe from \"stripe\";\nimport { env } from \"../config/env\";\n\nexport const stripe = new Stripe(env(\"STRIPE_SECRET_KEY\"));\nexport const currency = \"{{PAYMENT_CURRENCY}}\".toLowerCase();\nexport const webhooksEnabled = {{PAYMENT_WEBHOOKS}};\n",
        ))
        .file(
            FileContribution::new("package.json", r#"{"dependencies": {"stripe": "^14.0.0"}}"#)
                .structured(),
        )
        .manifest("stripe", "^14.0.0")
        .manifest("dotenv", "^16.0.0")
        .build()
}

fn storage_local() -> Result<ModuleDescriptor, DomainError> {
    ModuleDescriptor::builder("storage-local")
        .category("storage")
        .description("Uploads stored on the local disk")
        .tag("storage")
        .file(FileContribution::new(
            "src/storage/local.ts",
            "import { promises as fs } from \"fs\";\nimport path from \"path\";\n\nconst root = path.resolve(\"uploads\");\nexport const maxUploadBytes = {{STORAGE_MAX_UPLOAD_MB}} * 1024 * 1024;\n\nexport async function save(name: string, data: Buffer): Promise<string> {\n  await fs.mkdir(root, { recursive: true });\n  const target = path.join(root, name);\n  await fs.writeFile(target, data);\n  return target;\n}\n",
        ))
        .file(FileContribution::new("uploads/.gitkeep", ""))
        .build()
}

fn storage_s3() -> Result<ModuleDescriptor, DomainError> {
    ModuleDescriptor::builder("storage-s3")
        .category("storage")
        .priority(5)
        .depends_on("config-env")
        .support(TargetSupport::frameworks([Framework::WebApp, Framework::Api]))
        .description("Uploads stored in an S3 bucket")
        .tag("storage")
        .config(ModuleConfig::Storage {
            provider: "s3".into(),
            bucket: Some("uploads".into()),
            max_upload_mb: 50,
        })
        .file(
            FileContribution::new(
                ".env.example",
                "S3_BUCKET=\"{{STORAGE_BUCKET}}\"\nAWS_REGION=\"us-east-1\"\n",
            )
            .append(),
        )
        .file(FileContribution::new(
            "src/storage/s3.ts",
            "import { S3Client, PutObjectCommand } from \"@aws-sdk/client-s3\";\nimport { env } from \"../config/env\";\n\nconst client = new S3Client({ region: env(\"AWS_REGION\") });\nexport const maxUploadBytes = {{STORAGE_MAX_UPLOAD_MB}} * 1024 * 1024;\n\nexport async function save(key: string, body: Buffer): Promise<string> {\n  await client.send(new PutObjectCommand({ Bucket: env(\"S3_BUCKET\", \"{{STORAGE_BUCKET}}\"), Key: key, Body: body }));\n  return key;\n}\n",
        ))
        .file(
            FileContribution::new(
                "package.json",
                r#"{"dependencies": {"@aws-sdk/client-s3": "^3.500.0"}}"#,
            )
            .structured(),
        )
        .manifest("@aws-sdk/client-s3", "^3.500.0")
        .build()
}

// ── Data ──────────────────────────────────────────────────────────────────────

fn database_postgres() -> Result<ModuleDescriptor, DomainError> {
    ModuleDescriptor::builder("database-postgres")
        .category("database")
        .depends_on("config-env")
        .support(TargetSupport::frameworks([
            Framework::WebApp,
            Framework::Api,
            Framework::Desktop,
            Framework::Cli,
        ]))
        .variant(Framework::Mobile, "database-sqlite")
        .description("PostgreSQL connection pool and migrations")
        .tag("database")
        .config(ModuleConfig::Database {
            engine: "postgres".into(),
            pool_size: 10,
            migrations: true,
        })
        .file(
            FileContribution::new(
                ".env.example",
                "DATABASE_URL=\"postgres://localhost:5432/{{PROJECT_NAME_SNAKE}}\"\n",
            )
            .append(),
        )
        .file(FileContribution::new(
            "src/db/client.ts",
            "import { Pool } from \"pg\";\nimport { env } from \"../config/env\";\n\nexport const pool = new Pool({\n  connectionString: env(\"DATABASE_URL\"),\n  max: {{DATABASE_POOL_SIZE}},\n});\n",
        ))
        .file(FileContribution::new(
            "migrations/0001_init.sql",
            "-- {{PROJECT_NAME}} initial schema\nCREATE TABLE IF NOT EXISTS schema_info (\n  version INTEGER PRIMARY KEY\n);\n",
        ))
        .file(
            FileContribution::new("package.json", r#"{"dependencies": {"pg": "^8.11.0"}}"#)
                .structured(),
        )
        .manifest("pg", "^8.11.0")
        .build()
}

fn database_sqlite() -> Result<ModuleDescriptor, DomainError> {
    ModuleDescriptor::builder("database-sqlite")
        .category("database")
        .support(TargetSupport::frameworks([
            Framework::Mobile,
            Framework::Desktop,
            Framework::Cli,
        ]))
        .description("Embedded SQLite database")
        .tag("database")
        .config(ModuleConfig::Database {
            engine: "sqlite".into(),
            pool_size: 1,
            migrations: true,
        })
        .file(FileContribution::new(
            "src/db/client.ts",
            "import Database from \"better-sqlite3\";\n\nexport const db = new Database(\"{{PROJECT_NAME_SNAKE}}.db\");\n",
        ))
        .file(
            FileContribution::new(
                "package.json",
                r#"{"dependencies": {"better-sqlite3": "^9.4.0"}}"#,
            )
            .structured(),
        )
        .manifest("better-sqlite3", "^9.4.0")
        .build()
}

// ── Messaging ─────────────────────────────────────────────────────────────────

fn email_smtp() -> Result<ModuleDescriptor, DomainError> {
    ModuleDescriptor::builder("email-smtp")
        .category("email")
        .depends_on("config-env")
        .support(TargetSupport::frameworks([Framework::WebApp, Framework::Api]))
        .description("Transactional email over SMTP")
        .tag("email")
        .default_var("SMTP_FROM", "no-reply@example.com")
        .file(
            FileContribution::new(
                ".env.example",
                "SMTP_URL=\"smtp://localhost:1025\"\nSMTP_FROM=\"{{SMTP_FROM}}\"\n",
            )
            .append(),
        )
        .file(FileContribution::new(
            "src/email/mailer.ts",
            "import nodemailer from \"nodemailer\";\nimport { env } from \"../config/env\";\n\nexport const mailer = nodemailer.createTransport(env(\"SMTP_URL\"));\nexport const from = env(\"SMTP_FROM\", \"{{SMTP_FROM}}\");\n",
        ))
        .file(
            FileContribution::new(
                "package.json",
                r#"{"dependencies": {"nodemailer": "^6.9.0"}}"#,
            )
            .structured(),
        )
        .manifest("nodemailer", "^6.9.0")
        .build()
}

fn messaging_redis() -> Result<ModuleDescriptor, DomainError> {
    ModuleDescriptor::builder("messaging-redis")
        .category("messaging")
        .depends_on("config-env")
        .support(TargetSupport::frameworks([Framework::Api, Framework::Cli]))
        .description("Redis pub/sub event bus")
        .tag("messaging")
        .config(ModuleConfig::Messaging {
            broker: "redis".into(),
            topics: vec!["events".into()],
        })
        .file(
            FileContribution::new(".env.example", "REDIS_URL=\"redis://localhost:6379\"\n")
                .append(),
        )
        .file(FileContribution::new(
            "src/messaging/bus.ts",
            "import Redis from \"ioredis\";\nimport { env } from \"../config/env\";\n\nexport const publisher = new Redis(env(\"REDIS_URL\"));\nexport const topics = \"{{MESSAGING_TOPICS}}\".split(\",\");\n",
        ))
        .file(
            FileContribution::new("package.json", r#"{"dependencies": {"ioredis": "^5.3.0"}}"#)
                .structured(),
        )
        .manifest("ioredis", "^5.3.0")
        .build()
}

#[cfg(test)]
mod tests {
    use kiln_core::domain::{ModuleId, Strictness, Target, instantiation::instantiate, resolve};

    use super::*;

    fn every_target() -> impl Iterator<Item = Target> {
        Framework::ALL.iter().flat_map(|f| {
            Archetype::ALL
                .iter()
                .map(move |a| Target::new(*f, *a))
        })
    }

    #[test]
    fn catalog_registers_cleanly() {
        let registry = registry().unwrap();
        assert_eq!(registry.len(), catalog().unwrap().len());
        assert!(registry.get("auth-jwt").is_ok());
        assert!(registry.get("payment-stripe").is_ok());
    }

    #[test]
    fn every_target_has_exactly_one_baseline() {
        let registry = registry().unwrap();
        for target in every_target() {
            assert_eq!(registry.baselines_for(&target).len(), 1, "{target}");
        }
    }

    #[test]
    fn every_module_instantiates_on_every_supported_target() {
        let registry = registry().unwrap();
        for target in every_target() {
            let baseline = registry.baselines_for(&target)[0].id.clone();
            for module in registry.iter().filter(|m| !m.baseline) {
                if !module.supports(&target) && module.variants.get(&target.framework()).is_none()
                {
                    continue;
                }
                let requested = vec![baseline.clone(), module.id.clone()];
                let set = resolve(&registry, &requested, target, Strictness::Strict)
                    .unwrap_or_else(|e| panic!("{} on {target}: {e}", module.id));
                instantiate(&set, "Demo App", &BTreeMap::new())
                    .unwrap_or_else(|e| panic!("{} on {target}: {e}", module.id));
            }
        }
    }

    #[test]
    fn mobile_gets_the_sqlite_variant() {
        let registry = registry().unwrap();
        let target = Target::new(Framework::Mobile, Archetype::Business);
        let requested = vec![ModuleId::parse("database-postgres").unwrap()];
        let set = resolve(&registry, &requested, target, Strictness::Strict).unwrap();
        assert_eq!(set.ids(), ["database-sqlite"]);
        assert_eq!(set.warnings().len(), 1);
    }

    #[test]
    fn provider_modules_share_the_auth_slot() {
        let registry = registry().unwrap();
        let a = registry.get("auth-provider-a").unwrap();
        let b = registry.get("auth-provider-b").unwrap();
        assert_eq!(a.category, b.category);
        assert!(a.priority > b.priority);
    }
}
