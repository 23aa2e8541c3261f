/*
Copyright 2021 Jakub Lewandowski

This file is part of JAXA Rainfall Field Generator (jaxa-rfield).

JAXA Rainfall Field Generator (jaxa-rfield) is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

JAXA Rainfall Field Generator (jaxa-rfield) is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with JAXA Rainfall Field Generator (jaxa-rfield). If not, see https://www.gnu.org/licenses/.
*/

//! Module responsible for retrieving product archives from the remote host.
//!
//! The fetcher only knows how to turn a [`TimeWindow`] into a resource URL
//! and how to move the bytes behind that URL onto the local disk.
//! It never retries; deciding whether a missing archive is worth another
//! attempt is left to the orchestrator.

use super::{
    configuration::{Credentials, Source},
    window::TimeWindow,
};
use crate::{
    constants::{ARCHIVE_SUFFIX, PARTIAL_SUFFIX, PRODUCT_PREFIX, TABLE_SUFFIX},
    errors::FetchError,
};
use log::debug;
use percent_encoding::percent_decode_str;
use reqwest::{StatusCode, Url};
use std::{
    fs,
    io::{self, Write},
    net::ToSocketAddrs,
    path::{Path, PathBuf},
    time::Duration,
};
use suppaftp::{types::FileType, FtpError, FtpStream, Status};

#[derive(Clone, Debug)]
pub struct Fetcher {
    base_url: Url,
    region_code: String,
    credentials: Option<Credentials>,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(source: &Source) -> Result<Self, FetchError> {
        let mut base = source.base_url.clone();

        // joining onto a URL without trailing slash would replace its last segment
        if !base.ends_with('/') {
            base.push('/');
        }

        // the URL may carry a password, so it stays out of the error
        let mut base_url = Url::parse(&base).map_err(|err| FetchError::InvalidUrl(err.to_string()))?;

        if !matches!(base_url.scheme(), "ftp" | "http" | "https" | "file") {
            return Err(FetchError::UnsupportedScheme(base_url.scheme().to_string()));
        }

        // explicitly configured credentials win over the URL userinfo
        let credentials = source
            .credentials
            .clone()
            .or_else(|| userinfo_credentials(&base_url));

        // every URL derived from the base ends up in logs and errors
        let _ = base_url.set_password(None);
        let _ = base_url.set_username("");

        Ok(Fetcher {
            base_url,
            region_code: source.region_code.clone(),
            credentials,
            timeout: source.timeout(),
        })
    }

    /// Name of the archive published for the window,
    /// eg. `gsmap_now.20190326.0430_0529.05_AsiaSS.csv.zip`.
    pub fn archive_name(&self, window: &TimeWindow) -> String {
        format!(
            "{}.{}.{}.{}{}",
            PRODUCT_PREFIX,
            window.product_stamp(),
            self.region_code,
            TABLE_SUFFIX,
            ARCHIVE_SUFFIX
        )
    }

    /// Resource URL of the window's archive. Credentials are not part of it.
    pub fn resource_url(&self, window: &TimeWindow) -> Result<Url, FetchError> {
        let name = self.archive_name(window);

        self.base_url
            .join(&name)
            .map_err(|err| FetchError::InvalidUrl(format!("{}: {}", name, err)))
    }

    /// Downloads the window's archive into `dest_dir` and returns its path.
    ///
    /// The archive is first written under a temporary name, so the returned
    /// path always holds a complete, non-empty transfer.
    pub fn fetch(&self, window: &TimeWindow, dest_dir: &Path) -> Result<PathBuf, FetchError> {
        let url = self.resource_url(window)?;
        let local_path = dest_dir.join(self.archive_name(window));
        let partial_path = partial_path_for(&local_path);

        debug!("Fetching {} into {}", url, local_path.display());

        let bytes = match url.scheme() {
            "ftp" => self.retrieve_ftp(&url)?,
            "http" | "https" => self.retrieve_http(&url)?,
            "file" => retrieve_file(&url)?,
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        };

        if bytes.is_empty() {
            return Err(FetchError::EmptyTransfer(url.to_string()));
        }

        let stored = fs::File::create(&partial_path).and_then(|mut partial| {
            partial.write_all(&bytes)?;
            partial.sync_all()?;
            fs::rename(&partial_path, &local_path)
        });

        if let Err(err) = stored {
            let _ = fs::remove_file(&partial_path);
            return Err(FetchError::Store(err, local_path.display().to_string()));
        }

        debug!("Fetched {} bytes from {}", bytes.len(), url);

        Ok(local_path)
    }

    fn retrieve_ftp(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let host = url
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
        let port = url.port_or_known_default().unwrap_or(21);

        let address = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            FetchError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("cannot resolve {}", host),
            ))
        })?;

        let mut ftp = FtpStream::connect_timeout(address, self.timeout)?;
        ftp.get_ref().set_read_timeout(Some(self.timeout))?;

        let login = match &self.credentials {
            Some(credentials) => ftp.login(&credentials.username, &credentials.password),
            None => ftp.login("anonymous", "anonymous"),
        };

        match login {
            Ok(()) => (),
            Err(FtpError::UnexpectedResponse(response))
                if response.status == Status::NotLoggedIn =>
            {
                return Err(FetchError::LoginRejected(host.to_string()));
            }
            Err(err) => return Err(FetchError::Ftp(err)),
        }

        ftp.transfer_type(FileType::Binary)?;

        let retrieved = ftp.retr_as_buffer(url.path());
        let _ = ftp.quit();

        match retrieved {
            Ok(buffer) => Ok(buffer.into_inner()),
            Err(FtpError::UnexpectedResponse(response))
                if response.status == Status::FileUnavailable =>
            {
                Err(FetchError::NotAvailable(url.to_string()))
            }
            Err(err) => Err(FetchError::Ftp(err)),
        }
    }

    fn retrieve_http(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        let mut request = client.get(url.clone());

        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = request.send()?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(FetchError::NotAvailable(url.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetchError::LoginRejected(
                url.host_str().unwrap_or_default().to_string(),
            )),
            status if !status.is_success() => {
                Err(FetchError::HttpStatus(url.to_string(), status.as_u16()))
            }
            _ => Ok(response.bytes()?.to_vec()),
        }
    }
}

/// Login taken from `user:password@` of the URL, percent-decoded.
fn userinfo_credentials(url: &Url) -> Option<Credentials> {
    if url.username().is_empty() {
        return None;
    }

    let decode = |raw: &str| percent_decode_str(raw).decode_utf8_lossy().into_owned();

    Some(Credentials {
        username: decode(url.username()),
        password: url.password().map(decode).unwrap_or_default(),
    })
}

fn retrieve_file(url: &Url) -> Result<Vec<u8>, FetchError> {
    let path = url
        .to_file_path()
        .map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

    match fs::read(&path) {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(FetchError::NotAvailable(url.to_string()))
        }
        Err(err) => Err(FetchError::Io(err)),
    }
}

/// Sibling path used while a file is still being written.
pub(super) fn partial_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(PARTIAL_SUFFIX);

    path.with_file_name(name)
}
