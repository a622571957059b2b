//! 代理隧道
//!
//! TCP 模式经代理探测时自行完成 HTTP CONNECT 或 SOCKS5 握手，
//! 以便从代理的应答中区分目标不可达和代理自身故障。

use crate::error::ProbeError;
use base64::prelude::{Engine, BASE64_STANDARD};
use reqwest::Url;
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// 支持的代理协议
pub const SUPPORTED_SCHEMES: &[&str] = &["http", "socks5", "socks5h"];

const SOCKS_VERSION: u8 = 0x05;
const SOCKS_AUTH_NONE: u8 = 0x00;
const SOCKS_AUTH_USER_PASS: u8 = 0x02;
const SOCKS_CMD_CONNECT: u8 = 0x01;
const SOCKS_ATYP_IPV4: u8 = 0x01;
const SOCKS_ATYP_DOMAIN: u8 = 0x03;
const SOCKS_ATYP_IPV6: u8 = 0x04;
const DEFAULT_SOCKS_PORT: u16 = 1080;
const MAX_CONNECT_RESPONSE: usize = 8 * 1024;

/// 拆分 host:port，IPv6 地址可带方括号
pub fn split_host_port(target: &str) -> Result<(&str, u16), ProbeError> {
    let invalid = || ProbeError::Proxy(format!("无效的目标地址: {target}"));
    let (host, port) = target.rsplit_once(':').ok_or_else(invalid)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = port.parse::<u16>().map_err(|_| invalid())?;
    if host.is_empty() {
        return Err(invalid());
    }
    Ok((host, port))
}

/// 经代理建立到 `target` 的隧道
pub async fn connect_via_proxy(proxy: &Url, target: &str) -> Result<TcpStream, ProbeError> {
    let scheme = proxy.scheme();
    if !SUPPORTED_SCHEMES.contains(&scheme) {
        return Err(ProbeError::UnsupportedProxy {
            scheme: scheme.to_string(),
        });
    }

    let host = proxy
        .host_str()
        .ok_or_else(|| ProbeError::Proxy("缺少代理主机".to_string()))?
        .trim_start_matches('[')
        .trim_end_matches(']');
    let port = proxy.port_or_known_default().unwrap_or(DEFAULT_SOCKS_PORT);

    let mut stream =
        TcpStream::connect((host, port))
            .await
            .map_err(|source| ProbeError::Connect {
                target: format!("{host}:{port}"),
                source,
            })?;

    match scheme {
        "http" => http_connect(&mut stream, proxy, target).await?,
        "socks5" => socks5_connect(&mut stream, proxy, target, false).await?,
        _ => socks5_connect(&mut stream, proxy, target, true).await?,
    }

    Ok(stream)
}

/// 隧道建立后的二次确认
///
/// 在 `window` 内读一次：立即 EOF 或出错视为失败，无数据或读到数据视为成功。
pub async fn guard_tunnel(stream: &mut TcpStream, window: Duration) -> Result<(), ProbeError> {
    let mut buf = [0u8; 1];
    match timeout(window, stream.read(&mut buf)).await {
        Err(_) => Ok(()),
        Ok(Ok(0)) => Err(ProbeError::Proxy("隧道建立后连接被立即关闭".to_string())),
        Ok(Ok(_)) => Ok(()),
        Ok(Err(source)) => Err(ProbeError::Connect {
            target: "proxy tunnel".to_string(),
            source,
        }),
    }
}

fn proxy_io(source: std::io::Error) -> ProbeError {
    ProbeError::Connect {
        target: "proxy".to_string(),
        source,
    }
}

/// 代理地址中的用户名和密码，已做百分号解码
fn proxy_credentials(proxy: &Url) -> Result<Option<(String, String)>, ProbeError> {
    if proxy.username().is_empty() {
        return Ok(None);
    }

    let decode = |raw: &str| {
        urlencoding::decode(raw)
            .map(|value| value.into_owned())
            .map_err(|_| ProbeError::Proxy("代理凭据不是合法的 UTF-8".to_string()))
    };
    let username = decode(proxy.username())?;
    let password = decode(proxy.password().unwrap_or(""))?;
    Ok(Some((username, password)))
}

async fn http_connect(stream: &mut TcpStream, proxy: &Url, target: &str) -> Result<(), ProbeError> {
    let mut request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n");
    if let Some((username, password)) = proxy_credentials(proxy)? {
        let credentials = format!("{username}:{password}");
        request.push_str(&format!(
            "Proxy-Authorization: Basic {}\r\n",
            BASE64_STANDARD.encode(credentials)
        ));
    }
    request.push_str("\r\n");
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(proxy_io)?;

    // 逐字节读取响应头，避免吞掉隧道内的数据
    let mut response = Vec::with_capacity(128);
    let mut byte = [0u8; 1];
    while !response.ends_with(b"\r\n\r\n") {
        if response.len() >= MAX_CONNECT_RESPONSE {
            return Err(ProbeError::Proxy("代理响应头过长".to_string()));
        }
        if stream.read(&mut byte).await.map_err(proxy_io)? == 0 {
            return Err(ProbeError::Proxy("代理在应答前关闭了连接".to_string()));
        }
        response.push(byte[0]);
    }

    let head = String::from_utf8_lossy(&response);
    let status_line = head.lines().next().unwrap_or_default().trim();
    let code = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok());

    match code {
        Some(code) if (200..300).contains(&code) => Ok(()),
        _ => Err(ProbeError::Proxy(format!("代理拒绝 CONNECT: {status_line}"))),
    }
}

async fn socks5_connect(
    stream: &mut TcpStream,
    proxy: &Url,
    target: &str,
    remote_dns: bool,
) -> Result<(), ProbeError> {
    let (host, port) = split_host_port(target)?;
    let credentials = proxy_credentials(proxy)?;
    let with_auth = credentials.is_some();

    let greeting: &[u8] = if with_auth {
        &[SOCKS_VERSION, 2, SOCKS_AUTH_NONE, SOCKS_AUTH_USER_PASS]
    } else {
        &[SOCKS_VERSION, 1, SOCKS_AUTH_NONE]
    };
    stream.write_all(greeting).await.map_err(proxy_io)?;

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await.map_err(proxy_io)?;
    if choice[0] != SOCKS_VERSION {
        return Err(ProbeError::Proxy("代理返回了非 SOCKS5 应答".to_string()));
    }

    match (choice[1], credentials) {
        (SOCKS_AUTH_NONE, _) => {}
        (SOCKS_AUTH_USER_PASS, Some((username, password))) => {
            if username.len() > 255 || password.len() > 255 {
                return Err(ProbeError::Proxy("SOCKS5 用户名或密码过长".to_string()));
            }
            let mut auth = Vec::with_capacity(3 + username.len() + password.len());
            auth.push(0x01);
            auth.push(username.len() as u8);
            auth.extend_from_slice(username.as_bytes());
            auth.push(password.len() as u8);
            auth.extend_from_slice(password.as_bytes());
            stream.write_all(&auth).await.map_err(proxy_io)?;

            let mut status = [0u8; 2];
            stream.read_exact(&mut status).await.map_err(proxy_io)?;
            if status[1] != 0x00 {
                return Err(ProbeError::Proxy("SOCKS5 认证失败".to_string()));
            }
        }
        _ => {
            return Err(ProbeError::Proxy(
                "SOCKS5 代理不接受任何可用的认证方式".to_string(),
            ))
        }
    }

    let mut request = vec![SOCKS_VERSION, SOCKS_CMD_CONNECT, 0x00];
    let ip = match host.parse::<IpAddr>() {
        Ok(ip) => Some(ip),
        Err(_) if remote_dns => None,
        Err(_) => {
            let resolved = tokio::net::lookup_host((host, port))
                .await
                .map_err(|source| ProbeError::Connect {
                    target: target.to_string(),
                    source,
                })?
                .next()
                .ok_or_else(|| ProbeError::Proxy(format!("无法解析目标地址: {host}")))?;
            Some(resolved.ip())
        }
    };
    match ip {
        Some(IpAddr::V4(ip)) => {
            request.push(SOCKS_ATYP_IPV4);
            request.extend_from_slice(&ip.octets());
        }
        Some(IpAddr::V6(ip)) => {
            request.push(SOCKS_ATYP_IPV6);
            request.extend_from_slice(&ip.octets());
        }
        None => {
            if host.len() > 255 {
                return Err(ProbeError::Proxy(format!("目标主机名过长: {host}")));
            }
            request.push(SOCKS_ATYP_DOMAIN);
            request.push(host.len() as u8);
            request.extend_from_slice(host.as_bytes());
        }
    }
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request).await.map_err(proxy_io)?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await.map_err(proxy_io)?;
    if reply[1] != 0x00 {
        return Err(ProbeError::Proxy(format!(
            "SOCKS5 连接目标失败: {}",
            socks5_reply_message(reply[1])
        )));
    }

    // 丢弃绑定地址
    let addr_len = match reply[3] {
        SOCKS_ATYP_IPV4 => 4,
        SOCKS_ATYP_IPV6 => 16,
        SOCKS_ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await.map_err(proxy_io)?;
            len[0] as usize
        }
        other => {
            return Err(ProbeError::Proxy(format!(
                "SOCKS5 应答地址类型未知: {other}"
            )))
        }
    };
    let mut bound = vec![0u8; addr_len + 2];
    stream.read_exact(&mut bound).await.map_err(proxy_io)?;

    Ok(())
}

fn socks5_reply_message(code: u8) -> &'static str {
    match code {
        0x01 => "general failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown error",
    }
}
