use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use domain::datetime::{self, DEFAULT_FORMAT};
use domain::{
    compute_from_response, compute_overtime_hours, AttendanceRecord, AttendanceResponse, Hexagram,
    Line, NewTodo, OvertimeSummary, TodoId, TodoItem, TodoStatus,
};
use infrastructure::{
    CookieManager, FileStorage, LoginParams, PortalAuthService, PortalHttpClient, TodoApiClient,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use shared::{init_tracing, AppError, Config, LogFormat};
use tracing::{debug, info};

/// ポータル管理ツール
#[derive(Parser)]
#[command(name = "portal-admin")]
#[command(about = "Portal login, cookie, overtime and todo tooling", long_about = None)]
struct Cli {
    /// ログを JSON で出力
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to the portal (RSA-encrypted password)
    Login {
        /// Tenant (company) id, required for account logins
        #[arg(long, env = "PORTAL_TENANT_ID", default_value = "")]
        tenant: String,

        /// Account name, or phone number with --phone
        #[arg(long, env = "PORTAL_USER_ID")]
        user: String,

        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,

        /// Log in with a phone number instead of tenant + account
        #[arg(long)]
        phone: bool,

        /// Attempts before giving up (defaults to LOGIN_RETRY_COUNT)
        #[arg(long)]
        retries: Option<u32>,
    },

    /// Ask the portal whether the stored session is still valid
    Status,

    /// Log out and clear stored cookies
    Logout,

    /// Inspect or maintain the cookie jar
    Cookies {
        #[command(subcommand)]
        action: CookieAction,
    },

    /// Sum overtime hours from an attendance JSON export
    Overtime {
        /// `{ "code": "1", "data": [..] }` envelope or a bare record array
        #[arg(long)]
        file: PathBuf,

        /// Reference date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Manage the portal todo list
    Todo {
        #[command(subcommand)]
        action: TodoAction,
    },

    /// Convert an epoch value or a date string to portal (China Standard Time) formats
    Time {
        /// Epoch seconds (10 digits), epoch milliseconds or a date string; defaults to now
        value: Option<String>,
    },

    /// Cast a random hexagram
    Gua {
        /// Seed for a reproducible cast
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Subcommand)]
enum CookieAction {
    List,
    Clear,
    /// Remove expired cookies
    Sweep,
}

#[derive(Subcommand)]
enum TodoAction {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        page_size: u32,
    },
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Set the legacy completed flag
    Toggle {
        #[arg(long)]
        id: String,
        /// Mark as completed (omit to mark as not completed)
        #[arg(long)]
        completed: bool,
    },
    /// Advance a todo to its next status
    Cycle {
        #[arg(long)]
        id: String,
        /// Current status code (0/1/2); looked up from the list when omitted
        #[arg(long)]
        status: Option<String>,
    },
}

/// 設定から組み立てたサービス群
struct App {
    config: Config,
    cookies: Arc<CookieManager>,
    http: PortalHttpClient,
}

impl App {
    fn new(config: Config) -> Result<Self> {
        let storage = Arc::new(FileStorage::new(&config.cookie_storage_dir));
        let cookies = Arc::new(CookieManager::new(storage, config.cookie_storage_key.clone()));
        let http = PortalHttpClient::new(&config, cookies.clone())?;
        Ok(Self {
            config,
            cookies,
            http,
        })
    }

    fn auth(&self) -> Result<PortalAuthService> {
        Ok(PortalAuthService::new(&self.config, self.http.clone())?)
    }

    fn todos(&self) -> TodoApiClient {
        TodoApiClient::new(self.http.clone())
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    if let Err(e) = init_tracing(format) {
        eprintln!("トレーシング初期化エラー: {e}");
    }

    if let Err(e) = run(cli.command).await {
        match e.downcast_ref::<AppError>() {
            Some(app_error) => {
                eprintln!("{}", app_error.user_message());
                debug!(code = app_error.metadata().code, error = %app_error, "Command failed");
            }
            None => eprintln!("エラー: {e:#}"),
        }
        std::process::exit(1);
    }
}

/// 設定を読み込んでサービスを組み立てる（ポータルに接続するコマンドのみ）
fn load_app() -> Result<App> {
    let config = Config::from_env()?;
    info!(portal = %config.portal_base_url, environment = %config.environment, "Configuration loaded");
    App::new(config)
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Login {
            tenant,
            user,
            password,
            phone,
            retries,
        } => {
            let params = if phone {
                LoginParams::phone(&user, &password)
            } else {
                LoginParams::account(&tenant, &user, &password)
            };
            let auth = load_app()?.auth()?;
            let session = match retries {
                Some(count) => auth.login_with_retry(&params, Some(count)).await?,
                None => auth.auto_login(&params).await?,
            };

            println!("登录成功（密码编码: {:?}）", session.mode);
            if let Some(decoded) = &session.claims {
                let verified = if decoded.verified { "已验证" } else { "未验证签名" };
                println!(
                    "tenantId={} userId={} ({})",
                    decoded.claims.tenant_id.as_deref().unwrap_or("-"),
                    decoded.claims.user_id.as_deref().unwrap_or("-"),
                    verified
                );
            }
        }
        Commands::Status => {
            let app = load_app()?;
            let logged_in = app.auth()?.check_status().await;
            let status = app.cookies.auth_status();
            println!("服务端登录状态: {}", if logged_in { "已登录" } else { "未登录" });
            println!(
                "本地 Cookie: {} 个（认证 Cookie: {}）",
                status.count,
                if status.authenticated { "有" } else { "无" }
            );
        }
        Commands::Logout => {
            let acknowledged = load_app()?.auth()?.logout().await;
            println!(
                "已退出登录{}",
                if acknowledged { "" } else { "（服务端未确认，本地 Cookie 已清除）" }
            );
        }
        Commands::Cookies { action } => {
            let app = load_app()?;
            match action {
                CookieAction::List => {
                    println!("{}", serde_json::to_string_pretty(&app.cookies.auth_status())?)
                }
                CookieAction::Clear => {
                    app.cookies.clear();
                    println!("已清空所有 Cookie");
                }
                CookieAction::Sweep => {
                    let removed = app.cookies.sweep_expired();
                    println!("清理过期 Cookie: {} 个 {:?}", removed.len(), removed);
                }
            }
        }
        Commands::Todo { action } => run_todo(&load_app()?.todos(), action).await?,
        Commands::Overtime { file, date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let summary = overtime_from_file(&file, date)?;
            println!(
                "加班时长: {} 小时（计入 {} 条，跳过 {} 条）",
                summary.display(),
                summary.counted,
                summary.skipped
            );
        }
        Commands::Time { value } => {
            let at = match value {
                Some(text) => match datetime::parse_datetime(&text) {
                    Some(at) => at,
                    None => bail!("cannot read {:?} as a date or timestamp", text),
                },
                None => Utc::now(),
            };
            print!("{}", render_time(&at));
        }
        Commands::Gua { seed } => {
            let hexagram = match seed {
                Some(seed) => Hexagram::cast(&mut StdRng::seed_from_u64(seed)),
                None => Hexagram::cast(&mut rand::thread_rng()),
            };
            print!("{}", render_hexagram(&hexagram));
        }
    }

    Ok(())
}

async fn run_todo(todos: &TodoApiClient, action: TodoAction) -> Result<()> {
    match action {
        TodoAction::List { page, page_size } => {
            let page = todos.list(page, page_size).await?;
            for item in &page.items {
                println!("{}", render_todo(item));
            }
            println!("第 {} 页，共 {} 条", page.page, page.total);
        }
        TodoAction::Add { title, description } => {
            let mut todo = NewTodo::new(&title)?;
            if let Some(description) = description {
                todo = todo.with_description(description);
            }
            todos.add(&todo).await?;
            println!("添加成功: {}", todo.title);
        }
        TodoAction::Update {
            id,
            title,
            description,
        } => {
            todos
                .update(&TodoId::from_string(id), &title, description.as_deref())
                .await?;
            println!("更新成功");
        }
        TodoAction::Delete { id } => {
            todos.delete(&TodoId::from_string(id)).await?;
            println!("删除成功");
        }
        TodoAction::Toggle { id, completed } => {
            todos
                .toggle_legacy(&TodoId::from_string(id), completed)
                .await?;
            println!("状态更新成功: {}", TodoStatus::from_legacy(completed).label());
        }
        TodoAction::Cycle { id, status } => {
            let id = TodoId::from_string(id);
            let mut item = match status {
                Some(code) => TodoItem {
                    id,
                    title: String::new(),
                    description: None,
                    status: TodoStatus::from_code(&code)?,
                    created_at: None,
                    updated_at: None,
                },
                None => find_todo(todos, &id).await?,
            };
            let transition = todos.cycle_status(&mut item).await?;
            println!("状态更新成功: {}", transition);
        }
    }
    Ok(())
}

/// 一覧をページ送りして ID の一致する項目を探す
async fn find_todo(todos: &TodoApiClient, id: &TodoId) -> Result<TodoItem> {
    const PAGE_SIZE: u32 = 50;
    let mut page = 1;
    loop {
        let result = todos.list(page, PAGE_SIZE).await?;
        if let Some(item) = result.items.into_iter().find(|item| &item.id == id) {
            return Ok(item);
        }
        if result.total <= u64::from(page) * u64::from(PAGE_SIZE) {
            bail!("todo {} not found", id);
        }
        page += 1;
    }
}

/// 勤怠ファイルを読み込んで集計する
fn overtime_from_file(path: &Path, date: NaiveDate) -> Result<OvertimeSummary> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let raw: Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    if raw.is_array() {
        let records: Vec<AttendanceRecord> = serde_json::from_value(raw)?;
        return Ok(compute_overtime_hours(&records, date));
    }

    let response: AttendanceResponse = serde_json::from_value(raw)?;
    match compute_from_response(&response, date) {
        Some(summary) => Ok(summary),
        None => bail!("attendance response code is {:?}, expected \"1\"", response.code),
    }
}

/// 日時は中国標準時で表示する
fn render_todo(item: &TodoItem) -> String {
    let created = item
        .created_at
        .map(|at| datetime::format_china(&at, DEFAULT_FORMAT))
        .unwrap_or_else(|| "-".to_string());
    format!("[{}] {} {} ({})", item.id, item.status.label(), item.title, created)
}

fn render_time(at: &chrono::DateTime<Utc>) -> String {
    format!(
        "北京时间: {}\n中文格式: {} {} {}\n时间戳: {}\n",
        datetime::format_china(at, DEFAULT_FORMAT),
        datetime::to_chinese_format(at),
        datetime::chinese_weekday(at),
        datetime::chinese_month(at),
        at.timestamp_millis()
    )
}

/// 上爻から順に描く
fn render_hexagram(hexagram: &Hexagram) -> String {
    let mut out = format!("{}\n", hexagram);
    for line in hexagram.lines().iter().rev() {
        out.push_str(match line {
            Line::Yang => "━━━━━━━\n",
            Line::Yin => "━━━ ━━━\n",
        });
    }
    out
}
