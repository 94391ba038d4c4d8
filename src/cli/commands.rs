use clap::{Parser, Subcommand};

/// jvt CLI 应用程序
#[derive(Parser)]
#[command(name = "jvt")]
#[command(about = "JDK 版本管理工具：安装、切换、升级 Temurin JDK", long_about = None)]
#[command(version)]
pub struct Cli {
    /// JSON 格式输出（list / current / upgrade）
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// 顶级命令
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// 列出已安装的版本
    #[command(visible_alias = "ls")]
    List,
    /// 列出远程可安装的版本
    #[command(name = "list-remote", visible_alias = "ls-remote")]
    ListRemote,
    /// 安装指定版本
    Install {
        /// 主版本号（如 17）、完整版本（如 17.0.9+9）或版本前缀
        version: String,
        /// 安装完成后立即切换
        #[arg(long = "use")]
        use_after: bool,
    },
    /// 切换到已安装的版本
    Use {
        /// 已安装的版本或其前缀
        version: String,
        /// 同时写入系统级环境变量（需要管理员权限）
        #[arg(long)]
        system: bool,
    },
    /// 卸载已安装的版本
    #[command(visible_aliases = ["remove", "rm"])]
    Uninstall {
        /// 已安装的版本或其前缀
        version: String,
    },
    /// 显示当前激活的版本
    Current,
    /// 升级到同一主版本的最新构建
    Upgrade {
        /// 主版本号
        #[arg(required_unless_present = "all")]
        major: Option<u32>,
        /// 升级所有已安装的主版本
        #[arg(long, conflicts_with = "major")]
        all: bool,
        /// 只检查是否有新版本
        #[arg(long)]
        dry_run: bool,
        /// 保留旧版本
        #[arg(long)]
        keep_old: bool,
    },
    /// 输出 Shell 启动文件集成代码
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("jvt").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_aliases() {
        assert_eq!(parse(&["ls"]).command, Commands::List);
        assert_eq!(parse(&["ls-remote"]).command, Commands::ListRemote);
        assert_eq!(
            parse(&["rm", "17"]).command,
            Commands::Uninstall {
                version: "17".to_string()
            }
        );
    }

    #[test]
    fn test_install_use_flag_and_global_json() {
        let cli = parse(&["install", "21", "--use", "--json"]);
        assert!(cli.json);
        assert_eq!(
            cli.command,
            Commands::Install {
                version: "21".to_string(),
                use_after: true
            }
        );
    }

    #[test]
    fn test_upgrade_flags() {
        let cli = parse(&["upgrade", "--all", "--dry-run"]);
        assert_eq!(
            cli.command,
            Commands::Upgrade {
                major: None,
                all: true,
                dry_run: true,
                keep_old: false
            }
        );
        assert!(Cli::try_parse_from(["jvt", "upgrade", "17", "--all"]).is_err());
        assert!(Cli::try_parse_from(["jvt", "upgrade"]).is_err());
    }
}
