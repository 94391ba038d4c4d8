use crate::cli::commands::Commands;
use crate::cli::output::{InstalledEntry, OutputFormat, FORMATTER};
use crate::core::constants::env as env_names;
use crate::core::switcher::{current_version_from, EnvironmentSwitcher, SwitchReport};
use crate::core::upgrade::{BatchReport, UpgradeOptions, UpgradeOrchestrator, UpgradeOutcome};
use crate::environments::java::{ArchiveInstaller, InstalledVersionStore, SemanticVersion};
use crate::error::{with_context, AppError, AppResult, ContextualResult};
use crate::infrastructure::config::Config;
use crate::infrastructure::remote::{
    find_version, AdoptiumCatalog, ArtifactFetcher, CatalogClient, Downloader,
};
use crate::infrastructure::shell::{detect_shell, InjectionOutcome, UnixEnvBackend, UserEnvReport};
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;

/// 命令处理器
pub struct CommandHandler {
    config: Config,
    format: OutputFormat,
}

impl CommandHandler {
    /// 加载配置并创建命令处理器
    pub fn new(format: OutputFormat) -> ContextualResult<Self> {
        let config = with_context(Config::load(), "加载配置")?;
        Ok(Self::with_config(config, format))
    }

    pub fn with_config(config: Config, format: OutputFormat) -> Self {
        Self { config, format }
    }

    fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// 处理命令
    pub async fn handle_command(&mut self, command: Commands) -> ContextualResult<()> {
        match command {
            Commands::List => with_context(self.handle_list(), "列出已安装的版本"),
            Commands::ListRemote => {
                with_context(self.handle_list_remote().await, "查询远程版本")
            }
            Commands::Install { version, use_after } => with_context(
                self.handle_install(&version, use_after).await,
                &format!("安装 Java {version}"),
            ),
            Commands::Use { version, system } => {
                with_context(self.handle_use(&version, system), &format!("切换到 Java {version}"))
            }
            Commands::Uninstall { version } => {
                with_context(self.handle_uninstall(&version), &format!("卸载 Java {version}"))
            }
            Commands::Current => with_context(self.handle_current(), "查询当前版本"),
            Commands::Upgrade {
                major,
                all,
                dry_run,
                keep_old,
            } => {
                let options = UpgradeOptions { dry_run, keep_old };
                match major {
                    Some(major) if !all => with_context(
                        self.handle_upgrade_major(major, options).await,
                        &format!("升级 Java {major}"),
                    ),
                    _ => with_context(self.handle_upgrade_all(options).await, "升级所有版本"),
                }
            }
            Commands::Env => with_context(self.handle_env(), "生成 Shell 集成代码"),
        }
    }

    fn current_version(&self) -> Option<String> {
        let java_home = env::var(env_names::JAVA_HOME).ok();
        current_version_from(java_home.as_deref(), &self.config.install_dir()).ok()
    }

    fn handle_list(&self) -> AppResult<()> {
        let store = InstalledVersionStore::new(self.config.install_dir());
        let current = self.current_version();
        let mut installed = store.list_installed()?;
        // 新版本在前，无法解析的目录名排在最后
        installed.sort_by_cached_key(|name| {
            let parsed = SemanticVersion::parse(name).ok();
            (parsed.is_none(), Reverse(parsed), name.clone())
        });

        let entries: Vec<InstalledEntry> = installed
            .into_iter()
            .map(|version| InstalledEntry {
                active: current.as_deref() == Some(version.as_str()),
                version,
            })
            .collect();

        if self.is_json() {
            println!("{}", FORMATTER.installed(&entries)?);
            return Ok(());
        }

        if entries.is_empty() {
            println!("📭 尚未安装任何 Java 版本");
            println!("💡 运行 'jvt list-remote' 查看可安装的版本");
            return Ok(());
        }

        println!("📦 已安装的 Java 版本:");
        for entry in &entries {
            if entry.active {
                println!("  * {} (当前)", entry.version);
            } else {
                println!("    {}", entry.version);
            }
        }
        Ok(())
    }

    async fn handle_list_remote(&self) -> AppResult<()> {
        let catalog = AdoptiumCatalog::from_config(&self.config)?;
        println!("🔍 正在查询可用版本...");
        let descriptors = catalog.fetch_all().await?;

        if descriptors.is_empty() {
            println!("📭 没有找到适用于当前平台的版本");
            return Ok(());
        }

        let installed: BTreeSet<String> = InstalledVersionStore::new(self.config.install_dir())
            .list_installed()?
            .into_iter()
            .collect();

        println!("🌐 可安装的 Java 版本:");
        let mut seen = BTreeSet::new();
        for descriptor in descriptors.iter().filter(|d| seen.insert(d.major)) {
            let marker = if installed.contains(&descriptor.version) {
                " (已安装)"
            } else {
                ""
            };
            println!(
                "  Java {:<3} {} ({}){marker}",
                descriptor.major, descriptor.version, descriptor.distribution
            );
        }
        println!("💡 运行 'jvt install <major>' 安装指定版本");
        Ok(())
    }

    async fn handle_install(&self, query: &str, use_after: bool) -> AppResult<()> {
        self.config.ensure_directories()?;
        let catalog = AdoptiumCatalog::from_config(&self.config)?;

        println!("🔍 正在查询 Java {query}...");
        let descriptors = catalog.fetch_all().await?;
        let descriptor = find_version(&descriptors, query)
            .ok_or_else(|| AppError::catalog(format!("没有找到匹配 {query} 的可用版本")))?;
        let version = descriptor.version.clone();

        let installer = ArchiveInstaller::new(self.config.install_dir());
        if installer.store().is_installed(&version) {
            println!("✅ Java {version} 已经安装");
        } else {
            let downloader = Downloader::from_config(&self.config)?;
            println!("⬇️  正在下载 {}", descriptor.file_name);
            let archive = downloader.download_and_verify(descriptor).await?;

            println!("📦 正在解压到 {}", installer.store().version_dir(&version).display());
            let dir = installer.install(&archive, &version)?;
            println!("✅ Java {version} 安装完成: {}", dir.display());
        }

        if use_after {
            self.handle_use(&version, false)
        } else {
            println!("💡 运行 'jvt use {version}' 切换到该版本");
            Ok(())
        }
    }

    fn handle_use(&self, query: &str, system: bool) -> AppResult<()> {
        let switcher = EnvironmentSwitcher::for_current_platform(&self.config)?;
        let version = InstalledVersionStore::new(switcher.install_root()).resolve(query)?;
        let report = switcher.use_version(&version, system)?;
        print_switch_report(&report);
        Ok(())
    }

    fn handle_uninstall(&self, query: &str) -> AppResult<()> {
        let installer = ArchiveInstaller::new(self.config.install_dir());
        let version = installer.store().resolve(query)?;
        let was_active = self.current_version().as_deref() == Some(version.as_str());

        installer.uninstall(&version)?;
        println!("🗑️  已卸载 Java {version}");
        if was_active {
            println!("⚠️  卸载的是当前激活的版本，请运行 'jvt use <version>' 切换到其他版本");
        }
        Ok(())
    }

    fn handle_current(&self) -> AppResult<()> {
        let java_home = env::var(env_names::JAVA_HOME).ok();
        let install_dir = self.config.install_dir();
        let current = current_version_from(java_home.as_deref(), &install_dir);
        let java: Option<PathBuf> = which::which("java").ok();

        if self.is_json() {
            let version = current.as_ref().ok().map(String::as_str);
            let java = java.as_ref().map(|p| p.display().to_string());
            println!("{}", FORMATTER.current(version, java.as_deref())?);
            return Ok(());
        }

        match &current {
            Ok(version) => println!("☕ 当前 Java 版本: {version}"),
            Err(AppError::NotManaged { java_home }) => {
                println!("ℹ️  当前 JAVA_HOME 不由 jvt 管理: {java_home}");
                println!("💡 运行 'jvt use <version>' 切换到受管版本");
            }
            Err(_) => {
                println!("ℹ️  当前没有激活的 Java 版本");
                println!("💡 运行 'jvt use <version>' 激活一个版本");
            }
        }

        if let Some(java) = &java {
            println!("   java: {}", java.display());
            if let Ok(version) = &current {
                if !java.starts_with(install_dir.join(version)) {
                    println!("⚠️  PATH 中的 java 不是当前受管版本，可能被其他 Java 安装遮蔽");
                }
            }
        }
        Ok(())
    }

    async fn handle_upgrade_major(&self, major: u32, options: UpgradeOptions) -> AppResult<()> {
        let switcher = EnvironmentSwitcher::for_current_platform(&self.config)?;
        let catalog = AdoptiumCatalog::from_config(&self.config)?;
        let downloader = Downloader::from_config(&self.config)?;
        self.config.ensure_directories()?;

        if !self.is_json() {
            println!("🔍 正在检查 Java {major} 的更新...");
        }
        let orchestrator = UpgradeOrchestrator::new(&switcher, &catalog, &downloader);
        let outcome = orchestrator.upgrade_major(major, options).await?;

        if outcome == UpgradeOutcome::NotInstalled {
            return Err(AppError::not_installed(&major.to_string()));
        }

        if self.is_json() {
            println!("{}", FORMATTER.upgrade(major, &outcome)?);
        } else {
            print_upgrade_outcome(major, &outcome);
        }
        Ok(())
    }

    async fn handle_upgrade_all(&self, options: UpgradeOptions) -> AppResult<()> {
        let switcher = EnvironmentSwitcher::for_current_platform(&self.config)?;
        let catalog = AdoptiumCatalog::from_config(&self.config)?;
        let downloader = Downloader::from_config(&self.config)?;
        self.config.ensure_directories()?;

        if !self.is_json() {
            println!("🔍 正在检查所有已安装版本的更新...");
        }
        let orchestrator = UpgradeOrchestrator::new(&switcher, &catalog, &downloader);
        let report = orchestrator.upgrade_all(options).await?;

        if self.is_json() {
            println!("{}", FORMATTER.batch(&report)?);
        } else {
            print_batch_report(&report);
        }
        Ok(())
    }

    fn handle_env(&self) -> AppResult<()> {
        if cfg!(windows) {
            println!("ℹ️  Windows 上 'jvt use' 直接写入用户环境变量，无需 Shell 集成");
            return Ok(());
        }

        let backend = UnixEnvBackend::from_config(&self.config)?;
        if !detect_shell().is_posix_compatible() {
            eprintln!("⚠️  当前 Shell 不是 bash/zsh，以下代码可能需要手动改写");
        }
        print!("{}", backend.startup_block()?);
        Ok(())
    }
}

fn print_switch_report(report: &SwitchReport) {
    println!("✅ 已切换到 Java {}", report.version);
    println!("   JAVA_HOME={}", report.java_home.display());

    match &report.user {
        UserEnvReport::Persisted => {
            println!("📝 已写入用户环境变量，新打开的终端将自动生效");
        }
        UserEnvReport::ShellScript {
            script,
            injection,
            startup_block,
        } => {
            match injection {
                InjectionOutcome::Configured { updated, .. } => {
                    for file in updated {
                        println!("📝 已更新 {}", file.display());
                    }
                }
                InjectionOutcome::NoStartupFile => {
                    println!("⚠️  没有找到 Shell 启动文件，请手动添加以下内容:");
                    print!("{startup_block}");
                }
            }
            println!("💡 当前终端可运行: source \"{}\"", script.display());
        }
    }

    if report.system_applied {
        println!("🔒 已写入系统级环境变量");
    }

    for warning in &report.warnings {
        println!("⚠️  {warning}");
    }

    if !report.shadowing.is_empty() {
        println!("⚠️  系统级 PATH 中存在其他 Java 安装，可能遮蔽当前版本:");
        for entry in &report.shadowing {
            println!("     {entry}");
        }
    }
}

fn print_upgrade_outcome(major: u32, outcome: &UpgradeOutcome) {
    match outcome {
        UpgradeOutcome::Updated {
            from,
            to,
            activated,
            old_removed,
            warnings,
        } => {
            println!("✅ Java {major}: {from} → {to}");
            if *activated {
                println!("🔄 已切换到 {to}");
            }
            if *old_removed {
                println!("🗑️  已删除旧版本 {from}");
            }
            for warning in warnings {
                println!("⚠️  {warning}");
            }
        }
        UpgradeOutcome::Available { from, to } => {
            println!("🆕 Java {major}: {from} → {to} 可升级（未做任何更改）");
        }
        UpgradeOutcome::UpToDate { version } => {
            println!("✅ Java {major} 已是最新版本: {version}");
        }
        UpgradeOutcome::NotInstalled => {
            println!("ℹ️  Java {major} 未安装");
        }
    }
}

fn print_batch_report(report: &BatchReport) {
    if report.entries.is_empty() {
        println!("📭 尚未安装任何 Java 版本");
        return;
    }

    for entry in &report.entries {
        match &entry.result {
            Ok(outcome) => print_upgrade_outcome(entry.major, outcome),
            Err(e) => println!("❌ Java {}: {e}", entry.major),
        }
    }

    println!();
    print!(
        "📊 升级完成: {} 个已升级, {} 个已是最新",
        report.updated_count(),
        report.up_to_date_count()
    );
    if report.available_count() > 0 {
        print!(", {} 个可升级", report.available_count());
    }
    if report.error_count() > 0 {
        print!(", {} 个失败", report.error_count());
    }
    println!();
}
